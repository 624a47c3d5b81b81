//! `src/fs/file_entry.rs`
//! ============================================================
//! Per-entry filesystem metadata as produced by one listing.
//!
//! A `FileEntry` is a snapshot: it is built fresh on every listing or stat
//! and never outlives the listing cycle that produced it.

use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, TimeZone};
use compact_str::CompactString;

use crate::error::{AppError, AppResult};
use crate::util::humanize::human_readable_size;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    // Absolute path of the entry.
    pub path: PathBuf,

    // Base name, lossily converted for display and sorting.
    pub name: CompactString,

    // Last-modification timestamp.
    pub modified_time: SystemTime,

    // Byte length; always 0 for directories.
    pub size_bytes: u64,

    pub is_directory: bool,
    pub is_hidden: bool,
}

impl FileEntry {
    /// Stat `path`, following symlinks.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let meta: Metadata = fs::metadata(path).map_err(|e| AppError::from_io(path, e))?;

        Ok(Self::from_meta(path, &meta))
    }

    fn from_meta(path: &Path, meta: &Metadata) -> Self {
        let name: CompactString = path
            .file_name()
            .map_or_else(
                || CompactString::from(path.to_string_lossy()),
                |n: &OsStr| -> CompactString { CompactString::from(n.to_string_lossy()) },
            );

        let is_directory: bool = meta.is_dir();

        Self {
            path: path.to_path_buf(),
            is_hidden: is_hidden(path, meta),
            name,
            modified_time: meta.modified().unwrap_or(UNIX_EPOCH),
            size_bytes: if is_directory { 0 } else { meta.len() },
            is_directory,
        }
    }

    /// Lower-case name used for case-insensitive ordering.
    #[inline]
    #[must_use]
    pub fn sort_key(&self) -> String {
        self.name.as_str().to_lowercase()
    }

    // Human-readable size string.
    #[inline]
    #[must_use]
    pub fn size_human(&self) -> String {
        if self.is_directory {
            String::new()
        } else {
            human_readable_size(self.size_bytes)
        }
    }

    // Format the modification date.
    #[expect(clippy::cast_possible_wrap, reason = "Expected")]
    #[must_use]
    pub fn format_modified(&self, fmt: &str) -> String {
        let dur: Duration = self
            .modified_time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| -> Duration { Duration::from_secs(0) });

        let dt: DateTime<Local> = Local
            .timestamp_opt(dur.as_secs() as i64, dur.subsec_nanos())
            .single()
            .unwrap_or_else(|| -> DateTime<Local> { Local::now() });

        dt.format(fmt).to_string()
    }
}

/// Dotfile convention on every platform, plus the hidden attribute on Windows.
pub fn is_hidden(path: &Path, meta: &Metadata) -> bool {
    let dotted: bool = path
        .file_name()
        .is_some_and(|n: &OsStr| -> bool { n.to_string_lossy().starts_with('.') });

    dotted || has_hidden_attribute(meta)
}

/// Hidden check by name only, for walks that have no `Metadata` at hand.
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(windows)]
fn has_hidden_attribute(meta: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
const fn has_hidden_attribute(_meta: &Metadata) -> bool {
    false
}
