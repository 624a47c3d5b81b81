//! ``src/fs/dir_scanner.rs``
//!
//! # `Directory Scanner`: Filesystem Listing
//!
//! Reads one directory and returns its entries sorted directories-first, then
//! by case-insensitive name. Every call stats the directory afresh.

use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::fs::file_entry::FileEntry;

/// Scans the given directory and returns a sorted list of `FileEntry`.
///
/// # Arguments
/// * `path` - The path to the directory to scan.
/// * `show_hidden` - Whether to include hidden files/directories.
///
/// Fails only when the directory itself cannot be read. An entry whose stat
/// fails (removed or locked in the meantime) is left out of the result.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), show_hidden = show_hidden))]
pub fn list_directory(path: &Path, show_hidden: bool) -> AppResult<Vec<FileEntry>> {
    let start_time: Instant = Instant::now();

    let read_dir: ReadDir = fs::read_dir(path).map_err(|e| AppError::from_io(path, e))?;
    let mut entries: Vec<FileEntry> = Vec::new();
    let mut skipped: usize = 0;

    for dir_entry in read_dir {
        let entry_path: PathBuf = match dir_entry {
            Ok(e) => e.path(),

            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        match FileEntry::from_path(&entry_path) {
            Ok(info) => {
                if show_hidden || !info.is_hidden {
                    entries.push(info);
                }
            }

            Err(e) => {
                skipped += 1;
                debug!("Skipping unreadable entry {:?}: {}", entry_path, e);
            }
        }
    }

    sort_entries(&mut entries);

    let duration: Duration = start_time.elapsed();
    debug!(
        marker = "PERF_DIRECTORY_SCAN",
        operation_type = "list_directory",
        entries = entries.len(),
        skipped = skipped,
        "Directory scan completed in {:?}",
        duration
    );

    Ok(entries)
}

/// Sort entries: directories first, then case-insensitively by name
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by_cached_key(|entry: &FileEntry| -> (bool, String) {
        (!entry.is_directory, entry.sort_key())
    });
}
