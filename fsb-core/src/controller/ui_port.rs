//! The only surface the session uses to talk to a front end.
//!
//! All calls happen on the interactive thread. Prompts block until the user
//! answers; `None` means the user cancelled.

use std::path::{Path, PathBuf};

/// What kind of path `choose_path` should ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    OpenDir,
    OpenFile,
    SaveFile,
}

pub trait UiPort {
    /// Ask before a destructive action.
    fn confirm(&mut self, prompt: &str) -> bool;

    fn prompt_text(&mut self, title: &str, initial: &str) -> Option<String>;

    /// `start` is the directory (or suggested file) the chooser opens on.
    fn choose_path(&mut self, mode: PathMode, start: &Path) -> Option<PathBuf>;

    fn notify_error(&mut self, title: &str, message: &str);

    fn notify_info(&mut self, title: &str, message: &str);
}
