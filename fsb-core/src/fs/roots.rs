//! Filesystem roots the directory tree starts from.

use std::path::PathBuf;

/// Source of top-level tree nodes.
pub trait RootEnumerator: Send + Sync {
    fn enumerate_roots(&self) -> Vec<PathBuf>;
}

/// Host roots: `/` on POSIX, every mounted drive letter on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformRoots;

impl RootEnumerator for PlatformRoots {
    #[cfg(windows)]
    fn enumerate_roots(&self) -> Vec<PathBuf> {
        (b'A'..=b'Z')
            .map(|letter: u8| -> PathBuf { PathBuf::from(format!("{}:\\", letter as char)) })
            .filter(|root: &PathBuf| -> bool { root.exists() })
            .collect()
    }

    #[cfg(not(windows))]
    fn enumerate_roots(&self) -> Vec<PathBuf> {
        vec![PathBuf::from("/")]
    }
}

/// A fixed set of roots, for embedding the tree under a chosen directory.
#[derive(Debug, Clone, Default)]
pub struct FixedRoots(pub Vec<PathBuf>);

impl RootEnumerator for FixedRoots {
    fn enumerate_roots(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}
