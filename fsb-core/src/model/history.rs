//! ``src/model/history.rs``
//! ============================================================================
//! # `NavigationHistory`: back/forward stacks of visited directories
//!
//! The current directory is always the top of `history`. Callers validate
//! targets with [`validate_directory`] before recording them, so nothing in
//! here touches the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
pub struct NavigationHistory {
    /// Visited directories, oldest first; the last one is current.
    history: Vec<PathBuf>,

    /// Directories stepped back over, most recent last.
    future: Vec<PathBuf>,
}

impl NavigationHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visit. Re-visiting the current directory is a no-op and
    /// leaves `future` alone.
    pub fn visit(&mut self, path: impl Into<PathBuf>) {
        let path: PathBuf = path.into();

        if self.current() == Some(path.as_path()) {
            return;
        }

        self.history.push(path);
        self.future.clear();
    }

    /// Step back; `None` when there is nothing before the current entry.
    pub fn back(&mut self) -> Option<&Path> {
        if self.history.len() <= 1 {
            return None;
        }

        let left: PathBuf = self.history.pop()?;
        self.future.push(left);

        self.current()
    }

    pub fn forward(&mut self) -> Option<&Path> {
        let next: PathBuf = self.future.pop()?;
        self.history.push(next);

        self.current()
    }

    /// Visit the parent of `path`. `None` for a filesystem root.
    pub fn up(&mut self, path: &Path) -> Option<&Path> {
        let parent: PathBuf = path.parent()?.to_path_buf();
        self.visit(parent);

        self.current()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Path> {
        self.history.last().map(PathBuf::as_path)
    }

    #[inline]
    #[must_use]
    pub fn can_go_back(&self) -> bool {
        self.history.len() > 1
    }

    #[inline]
    #[must_use]
    pub fn can_go_forward(&self) -> bool {
        !self.future.is_empty()
    }
}

/// Check that `path` is an existing directory and return its canonical form.
pub fn validate_directory(path: &Path) -> AppResult<PathBuf> {
    let canonical: PathBuf = fs::canonicalize(path).map_err(|e| AppError::from_io(path, e))?;

    if !canonical.is_dir() {
        return Err(AppError::invalid_path(path, "not a directory"));
    }

    Ok(canonical)
}
