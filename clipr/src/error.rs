//! Clipboard error handling with path context on every variant

use compact_str::CompactString;
use std::io::{self, ErrorKind};
use std::path::Path;
use thiserror::Error;

pub type ClipResult<T> = Result<T, ClipError>;

/// Failures produced while staging or pasting clipboard items.
#[derive(Error, Debug)]
pub enum ClipError {
    #[error("Source not found: {path}")]
    NotFound { path: CompactString },

    #[error("Access denied: {path}")]
    AccessDenied { path: CompactString },

    #[error("Destination already exists: {path}")]
    AlreadyExists { path: CompactString },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath {
        path: CompactString,
        reason: CompactString,
    },

    #[error("File system error on {path}: {kind:?}")]
    FileSystemError {
        path: CompactString,
        kind: ErrorKind,
        #[source]
        source: io::Error,
    },
}

impl ClipError {
    /// Classify an IO error raised while touching `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path: CompactString = CompactString::from(path.to_string_lossy());

        match err.kind() {
            ErrorKind::NotFound => Self::NotFound { path },

            ErrorKind::PermissionDenied => Self::AccessDenied { path },

            ErrorKind::AlreadyExists => Self::AlreadyExists { path },

            kind => Self::FileSystemError {
                path,
                kind,
                source: err,
            },
        }
    }

    #[inline]
    pub fn invalid_path(path: &Path, reason: impl Into<CompactString>) -> Self {
        Self::InvalidPath {
            path: CompactString::from(path.to_string_lossy()),
            reason: reason.into(),
        }
    }

    /// Path the failure refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path }
            | Self::AccessDenied { path }
            | Self::AlreadyExists { path }
            | Self::InvalidPath { path, .. }
            | Self::FileSystemError { path, .. } => path,
        }
    }
}
