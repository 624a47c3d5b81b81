//! ``src/model/fs_state.rs``
//! ============================================================================
//! # `DirectoryListModel`: flat listing of the directory a view shows
//!
//! Holds the entries of one directory as last listed. Nothing is cached
//! across loads: `load` and `refresh` always go back to the filesystem, and a
//! failed load leaves the previous listing untouched.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AppResult;
use crate::fs::dir_scanner::list_directory;
use crate::fs::file_entry::FileEntry;

#[derive(Debug, Clone)]
pub struct DirectoryListModel {
    /// The directory whose entries are held.
    directory: PathBuf,

    /// Entries from the most recent successful listing.
    entries: Vec<FileEntry>,

    show_hidden: bool,
}

impl DirectoryListModel {
    #[must_use]
    pub fn new(show_hidden: bool) -> Self {
        Self {
            directory: PathBuf::new(),
            entries: Vec::new(),
            show_hidden,
        }
    }

    /// Stat `directory` and return its sorted, hidden-filtered entries.
    pub fn list(&self, directory: &Path) -> AppResult<Vec<FileEntry>> {
        list_directory(directory, self.show_hidden)
    }

    /// List `directory` and make it the current one.
    pub fn load(&mut self, directory: &Path) -> AppResult<&[FileEntry]> {
        let entries: Vec<FileEntry> = self.list(directory)?;

        debug!(
            operation_type = "listing_load",
            directory = %directory.display(),
            entries = entries.len(),
            "Listing replaced"
        );

        self.directory = directory.to_path_buf();
        self.entries = entries;

        Ok(&self.entries)
    }

    /// Re-list the current directory.
    pub fn refresh(&mut self) -> AppResult<&[FileEntry]> {
        let directory: PathBuf = self.directory.clone();
        self.load(&directory)
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Entry with exactly this name in the current listing.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&FileEntry> {
        self.entries
            .iter()
            .find(|entry: &&FileEntry| -> bool { entry.name == name })
    }

    #[must_use]
    pub const fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    /// Toggle hidden entries and re-list when a directory is loaded.
    pub fn set_show_hidden(&mut self, show_hidden: bool) -> AppResult<()> {
        self.show_hidden = show_hidden;

        if !self.directory.as_os_str().is_empty() {
            self.refresh()?;
        }

        Ok(())
    }
}
