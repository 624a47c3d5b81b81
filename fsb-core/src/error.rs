//! src/error.rs
//! ============================================================================
//! # `AppError`: Unified Error Type for the Browser Engine
//!
//! Every variant names the offending path (or job) and the underlying cause so
//! it can be shown to the user as-is. Modules return `AppResult<T>`.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use clipr::ClipError;
use compact_str::CompactString;
use thiserror::Error;

use crate::controller::session::ViewId;
use crate::controller::task_queue::JobId;

pub type AppResult<T> = Result<T, AppError>;

/// Unified error type for all filesystem engine operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested file or directory does not exist.
    #[error("File or directory not found: {0:?}")]
    NotFound(PathBuf),

    /// Permissions error for file/directory access.
    #[error("Permission denied: {0:?}")]
    AccessDenied(PathBuf),

    /// Destination is already taken.
    #[error("Already exists: {0:?}")]
    AlreadyExists(PathBuf),

    /// Navigation target missing or not a directory.
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: CompactString },

    /// Bulk operation where at least one item failed.
    #[error("{operation}: {failed} of {total} items failed\n{}", .details.join("\n"))]
    PartialFailure {
        operation: CompactString,
        failed: usize,
        total: usize,
        details: Vec<String>,
    },

    /// Malformed archive or rejected archive entry.
    #[error("Archive error in {path:?}: {reason}")]
    Archive { path: PathBuf, reason: String },

    /// Any other IO failure, with the path it happened on.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Search pattern that does not compile.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        pattern: CompactString,
        reason: CompactString,
    },

    /// A job body panicked on its thread.
    #[error("Job {job_id} panicked: {message}")]
    JobPanicked { job_id: JobId, message: String },

    /// Submission after the worker has been stopped.
    #[error("Background worker is stopped")]
    WorkerStopped,

    /// Operation addressed a folder view that is not open.
    #[error("No open folder view {0}")]
    UnknownView(ViewId),
}

impl AppError {
    /// Classify an IO error raised while touching `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),

            ErrorKind::PermissionDenied => Self::AccessDenied(path.to_path_buf()),

            ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_path_buf()),

            ErrorKind::NotADirectory => Self::invalid_path(path, "not a directory"),

            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    #[inline]
    pub fn invalid_path(path: &Path, reason: impl Into<CompactString>) -> Self {
        Self::InvalidPath {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn archive(path: &Path, reason: impl Into<String>) -> Self {
        Self::Archive {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Aggregate per-item failure messages into one report.
    pub fn partial_failure(
        operation: impl Into<CompactString>,
        total: usize,
        details: Vec<String>,
    ) -> Self {
        Self::PartialFailure {
            operation: operation.into(),
            failed: details.len(),
            total,
            details,
        }
    }

    /// Short title for user notifications.
    pub fn title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not found",
            Self::AccessDenied(_) => "Access denied",
            Self::AlreadyExists(_) => "Already exists",
            Self::InvalidPath { .. } => "Invalid path",
            Self::PartialFailure { .. } => "Some items failed",
            Self::Archive { .. } => "Archive error",
            Self::Io { .. } => "I/O error",
            Self::InvalidPattern { .. } => "Invalid pattern",
            Self::JobPanicked { .. } => "Background job failed",
            Self::WorkerStopped => "Background worker stopped",
            Self::UnknownView(_) => "Unknown view",
        }
    }
}

impl From<ClipError> for AppError {
    fn from(err: ClipError) -> Self {
        match err {
            ClipError::NotFound { path } => Self::NotFound(PathBuf::from(path.as_str())),

            ClipError::AccessDenied { path } => Self::AccessDenied(PathBuf::from(path.as_str())),

            ClipError::AlreadyExists { path } => {
                Self::AlreadyExists(PathBuf::from(path.as_str()))
            }

            ClipError::InvalidPath { path, reason } => Self::InvalidPath {
                path: PathBuf::from(path.as_str()),
                reason,
            },

            ClipError::FileSystemError { path, source, .. } => Self::Io {
                path: PathBuf::from(path.as_str()),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_taxonomy() {
        let path = Path::new("/srv/data");

        assert!(matches!(
            AppError::from_io(path, io::Error::from(ErrorKind::NotFound)),
            AppError::NotFound(p) if p == path
        ));
        assert!(matches!(
            AppError::from_io(path, io::Error::from(ErrorKind::PermissionDenied)),
            AppError::AccessDenied(_)
        ));
        assert!(matches!(
            AppError::from_io(path, io::Error::from(ErrorKind::NotADirectory)),
            AppError::InvalidPath { .. }
        ));
        assert!(matches!(
            AppError::from_io(path, io::Error::from(ErrorKind::UnexpectedEof)),
            AppError::Io { .. }
        ));
    }

    #[test]
    fn test_partial_failure_message_lists_items() {
        let err = AppError::partial_failure(
            "Paste",
            3,
            vec!["a: denied".to_string(), "b: missing".to_string()],
        );

        let message = err.to_string();
        assert!(message.starts_with("Paste: 2 of 3 items failed"));
        assert!(message.contains("a: denied"));
        assert!(message.contains("b: missing"));
    }

    #[test]
    fn test_clip_error_conversion_keeps_path() {
        let clip = ClipError::from_io(Path::new("/x/y"), io::Error::from(ErrorKind::NotFound));
        let app: AppError = clip.into();
        assert!(matches!(app, AppError::NotFound(p) if p == Path::new("/x/y")));
    }
}
