use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Pending action attached to a clipboard entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOperation {
    Copy,
    Cut,
}

impl std::fmt::Display for ClipboardOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Cut => write!(f, "Cut"),
        }
    }
}

/// One path waiting for a paste target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardItem {
    pub source_path: PathBuf,
    pub operation: ClipboardOperation,
}

impl ClipboardItem {
    pub fn new(source_path: PathBuf, operation: ClipboardOperation) -> Self {
        Self {
            source_path,
            operation,
        }
    }

    pub fn new_copy(path: PathBuf) -> Self {
        Self::new(path, ClipboardOperation::Copy)
    }

    pub fn new_cut(path: PathBuf) -> Self {
        Self::new(path, ClipboardOperation::Cut)
    }

    /// Base name used as the paste destination name.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.source_path.file_name()
    }

    pub fn display_name(&self) -> &str {
        self.source_path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("Unknown")
    }

    pub fn operation_tag(&self) -> &'static str {
        match self.operation {
            ClipboardOperation::Copy => "C",
            ClipboardOperation::Cut => "X",
        }
    }

    #[inline]
    pub fn source(&self) -> &Path {
        &self.source_path
    }
}
