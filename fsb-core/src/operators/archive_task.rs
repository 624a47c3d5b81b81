//! ``src/operators/archive_task.rs``
//! ============================================================================
//! # Zip archive creation and extraction
//!
//! Both directions run as worker-queue jobs. Entry names inside an archive
//! are relative to each source's parent, so `create([dirA, fileB])` stores
//! `dirA/...` and `fileB` side by side. Directories get their own entries,
//! which keeps empty ones across a round trip.
//!
//! Symlinked files are stored with their target's contents. Entries that
//! cannot be stored (dangling links, links to directories, sockets) are
//! listed in the summary instead of being dropped quietly.
//!
//! Extraction only writes entries whose name stays inside the destination.
//! Anything else is skipped and reported back.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub dest: PathBuf,
    pub files: usize,
    pub directories: usize,

    /// Entries under a source that were not stored.
    pub skipped: Vec<PathBuf>,
}

impl ArchiveSummary {
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub dest: PathBuf,

    /// Files and directories written under `dest`.
    pub extracted: usize,

    /// Entry names refused because they resolve outside `dest`.
    pub rejected: Vec<String>,
}

impl ExtractReport {
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

fn zip_error(path: &Path, err: ZipError) -> AppError {
    match err {
        ZipError::Io(io_err) => AppError::from_io(path, io_err),
        other => AppError::archive(path, other.to_string()),
    }
}

/// Zip entry name for `path` relative to `base`, always `/`-separated.
fn entry_name(path: &Path, base: &Path) -> Option<String> {
    let relative: &Path = path.strip_prefix(base).ok()?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|c: Component<'_>| -> Option<String> {
            match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            }
        })
        .collect();

    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Write `sources` into a new zip at `dest`, Deflate-compressed.
///
/// A partially written archive is removed when any source fails.
#[instrument(level = "debug", skip_all, fields(dest = %dest.display(), sources = sources.len()))]
pub fn create_archive(sources: &[PathBuf], dest: &Path) -> AppResult<ArchiveSummary> {
    if sources.is_empty() {
        return Err(AppError::invalid_path(dest, "nothing to archive"));
    }

    for source in sources {
        if fs::symlink_metadata(source).is_err() {
            return Err(AppError::NotFound(source.clone()));
        }
    }

    let start_time: Instant = Instant::now();
    let result: AppResult<ArchiveSummary> = write_archive(sources, dest);

    match &result {
        Ok(summary) => info!(
            marker = "ARCHIVE_CREATED",
            operation_type = "archive_create",
            files = summary.files,
            directories = summary.directories,
            skipped = summary.skipped.len(),
            "Archive written in {:?}",
            start_time.elapsed()
        ),

        Err(err) => {
            warn!(dest = %dest.display(), error = %err, "Archive creation failed");
            if let Err(e) = fs::remove_file(dest) {
                debug!("No partial archive to remove: {}", e);
            }
        }
    }

    result
}

fn write_archive(sources: &[PathBuf], dest: &Path) -> AppResult<ArchiveSummary> {
    let file: File = File::create(dest).map_err(|e| AppError::from_io(dest, e))?;
    let mut writer: ZipWriter<BufWriter<File>> = ZipWriter::new(BufWriter::new(file));
    let options: SimpleFileOptions =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut summary = ArchiveSummary {
        dest: dest.to_path_buf(),
        files: 0,
        directories: 0,
        skipped: Vec::new(),
    };

    for source in sources {
        let base: &Path = source.parent().unwrap_or_else(|| Path::new(""));

        let walker = WalkDir::new(source)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            let entry: DirEntry = entry.map_err(|e| {
                let path: PathBuf = e.path().map_or_else(|| source.clone(), Path::to_path_buf);
                match e.into_io_error() {
                    Some(io_err) => AppError::from_io(&path, io_err),
                    None => AppError::invalid_path(&path, "filesystem loop"),
                }
            })?;

            let path: &Path = entry.path();
            if path == dest {
                continue;
            }

            let Some(name) = entry_name(path, base) else {
                continue;
            };

            let file_type: fs::FileType = entry.file_type();

            if file_type.is_dir() {
                writer
                    .add_directory(format!("{name}/"), options)
                    .map_err(|e| zip_error(dest, e))?;
                summary.directories += 1;
            } else if file_type.is_file() || (file_type.is_symlink() && links_to_file(path)) {
                add_file(&mut writer, path, name, options, dest)?;
                summary.files += 1;
            } else {
                warn!(path = %path.display(), "Entry not stored in archive");
                summary.skipped.push(path.to_path_buf());
            }
        }
    }

    let mut sink: BufWriter<File> = writer.finish().map_err(|e| zip_error(dest, e))?;
    sink.flush().map_err(|e| AppError::from_io(dest, e))?;

    Ok(summary)
}

fn links_to_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file())
}

/// Append one file's contents, reading through a symlink if `path` is one.
fn add_file(
    writer: &mut ZipWriter<BufWriter<File>>,
    path: &Path,
    name: String,
    options: SimpleFileOptions,
    dest: &Path,
) -> AppResult<()> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| AppError::from_io(path, e))?);

    writer
        .start_file(name, options)
        .map_err(|e| zip_error(dest, e))?;
    io::copy(&mut reader, writer).map_err(|e| AppError::from_io(path, e))?;

    Ok(())
}

/// Unpack `archive` under `dest_dir`, creating it when missing.
///
/// Existing files with the same names are overwritten.
#[instrument(level = "debug", skip_all, fields(archive = %archive.display(), dest = %dest_dir.display()))]
pub fn extract_archive(archive: &Path, dest_dir: &Path) -> AppResult<ExtractReport> {
    let start_time: Instant = Instant::now();

    let file: File = File::open(archive).map_err(|e| AppError::from_io(archive, e))?;
    let mut zip: ZipArchive<BufReader<File>> =
        ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(archive, e))?;

    fs::create_dir_all(dest_dir).map_err(|e| AppError::from_io(dest_dir, e))?;

    let mut report = ExtractReport {
        dest: dest_dir.to_path_buf(),
        extracted: 0,
        rejected: Vec::new(),
    };

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| zip_error(archive, e))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(
                archive = %archive.display(),
                entry = entry.name(),
                "Rejected archive entry escaping the destination"
            );
            report.rejected.push(entry.name().to_string());
            continue;
        };

        let out_path: PathBuf = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| AppError::from_io(&out_path, e))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| AppError::from_io(parent, e))?;
            }

            let mut out = BufWriter::new(File::create(&out_path).map_err(|e| AppError::from_io(&out_path, e))?);
            io::copy(&mut entry, &mut out).map_err(|e| AppError::from_io(&out_path, e))?;
            out.flush().map_err(|e| AppError::from_io(&out_path, e))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;

                if let Err(e) = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777)) {
                    debug!("Could not apply mode to {:?}: {}", out_path, e);
                }
            }
        }

        report.extracted += 1;
    }

    info!(
        marker = "ARCHIVE_EXTRACTED",
        operation_type = "archive_extract",
        extracted = report.extracted,
        rejected = report.rejected.len(),
        "Archive extracted in {:?}",
        start_time.elapsed()
    );

    Ok(report)
}
