//! Filesystem primitives behind paste: collision-free naming, metadata
//! preserving copies and moves that survive filesystem boundaries.

use crate::error::{ClipError, ClipResult};
use crate::item::{ClipboardItem, ClipboardOperation};
use filetime::FileTime;
use std::ffi::{OsStr, OsString};
use std::fs::{self, Metadata};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Result of pasting one clipboard item.
#[derive(Debug)]
pub struct PasteOutcome {
    pub item: ClipboardItem,
    /// Final destination on success.
    pub result: ClipResult<PathBuf>,
}

impl PasteOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn destination(&self) -> Option<&Path> {
        self.result.as_ref().ok().map(PathBuf::as_path)
    }
}

/// Paste every item into `target_dir`, in order, independently of each other.
///
/// Pure filesystem work: the clipboard itself is not touched, so this may run
/// on a background thread. Feed the outcomes to
/// [`Clipboard::apply_outcomes`](crate::Clipboard::apply_outcomes) afterwards.
pub fn execute_paste(items: &[ClipboardItem], target_dir: &Path) -> Vec<PasteOutcome> {
    items
        .iter()
        .map(|item: &ClipboardItem| -> PasteOutcome {
            let result: ClipResult<PathBuf> = paste_item(item, target_dir);

            match &result {
                Ok(dest) => debug!(
                    operation_type = "paste_item",
                    source = %item.source_path.display(),
                    dest = %dest.display(),
                    operation = %item.operation,
                    "Pasted clipboard item"
                ),

                Err(err) => warn!(
                    operation_type = "paste_item",
                    source = %item.source_path.display(),
                    error = %err,
                    "Clipboard item failed to paste"
                ),
            }

            PasteOutcome {
                item: item.clone(),
                result,
            }
        })
        .collect()
}

fn paste_item(item: &ClipboardItem, target_dir: &Path) -> ClipResult<PathBuf> {
    let source: &Path = item.source();

    let name: &OsStr = item
        .file_name()
        .ok_or_else(|| ClipError::invalid_path(source, "has no file name"))?;

    let source_meta: Metadata =
        fs::symlink_metadata(source).map_err(|e| ClipError::from_io(source, e))?;

    let target_meta: Metadata =
        fs::metadata(target_dir).map_err(|e| ClipError::from_io(target_dir, e))?;

    if !target_meta.is_dir() {
        return Err(ClipError::invalid_path(target_dir, "not a directory"));
    }

    if source_meta.is_dir() {
        ensure_not_nested(source, target_dir)?;
    }

    let dest: PathBuf = unique_destination(target_dir, name, source_meta.is_dir());

    match item.operation {
        ClipboardOperation::Copy => {
            if source_meta.is_dir() {
                copy_recursive(source, &dest)?;
            } else {
                copy_file_preserving(source, &dest)?;
            }
        }

        ClipboardOperation::Cut => move_path(source, &dest)?,
    }

    Ok(dest)
}

fn ensure_not_nested(source_dir: &Path, target_dir: &Path) -> ClipResult<()> {
    let source: PathBuf = fs::canonicalize(source_dir).map_err(|e| ClipError::from_io(source_dir, e))?;
    let target: PathBuf = fs::canonicalize(target_dir).map_err(|e| ClipError::from_io(target_dir, e))?;

    if target.starts_with(&source) {
        return Err(ClipError::invalid_path(
            target_dir,
            format!("cannot paste {} into itself", source_dir.display()),
        ));
    }

    Ok(())
}

/// First free name for `name` inside `target_dir`.
///
/// A taken name gets `" (N)"` inserted before its extension, `N` counting up
/// from 1. Directories never have an extension.
pub fn unique_destination(target_dir: &Path, name: &OsStr, is_dir: bool) -> PathBuf {
    let candidate: PathBuf = target_dir.join(name);
    if !path_taken(&candidate) {
        return candidate;
    }

    let (stem, extension) = split_name(name, is_dir);

    (1u64..)
        .map(|n: u64| -> PathBuf {
            let mut numbered: OsString = stem.clone();
            numbered.push(format!(" ({n})"));
            if let Some(ext) = &extension {
                numbered.push(".");
                numbered.push(ext);
            }
            target_dir.join(numbered)
        })
        .find(|path: &PathBuf| -> bool { !path_taken(path) })
        .unwrap_or(candidate)
}

fn split_name(name: &OsStr, is_dir: bool) -> (OsString, Option<OsString>) {
    if is_dir {
        return (name.to_os_string(), None);
    }

    let as_path: &Path = Path::new(name);
    match (as_path.file_stem(), as_path.extension()) {
        (Some(stem), Some(ext)) => (stem.to_os_string(), Some(ext.to_os_string())),
        _ => (name.to_os_string(), None),
    }
}

// Broken symlinks count as taken.
#[inline]
fn path_taken(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Copy one file, keeping permissions and access/modification times.
pub fn copy_file_preserving(source: &Path, dest: &Path) -> ClipResult<()> {
    fs::copy(source, dest).map_err(|e| ClipError::from_io(source, e))?;

    let meta: Metadata = fs::metadata(source).map_err(|e| ClipError::from_io(source, e))?;
    preserve_times(&meta, dest)
}

fn preserve_times(meta: &Metadata, dest: &Path) -> ClipResult<()> {
    let atime: FileTime = FileTime::from_last_access_time(meta);
    let mtime: FileTime = FileTime::from_last_modification_time(meta);

    filetime::set_file_times(dest, atime, mtime).map_err(|e| ClipError::from_io(dest, e))
}

/// Recursively copy a directory tree to `dest`, which must not exist yet.
///
/// Symlinks are recreated as links on unix and copied by content elsewhere.
pub fn copy_recursive(source: &Path, dest: &Path) -> ClipResult<()> {
    // Post-order so directory times are set after their contents are written.
    for entry in WalkDir::new(source).follow_links(false).contents_first(true) {
        let entry: DirEntry = entry.map_err(|e| {
            let path: PathBuf = e.path().map_or_else(|| source.to_path_buf(), Path::to_path_buf);
            match e.into_io_error() {
                Some(io_err) => ClipError::from_io(&path, io_err),
                None => ClipError::invalid_path(&path, "filesystem loop"),
            }
        })?;

        let relative: &Path = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| ClipError::invalid_path(entry.path(), "escaped copy root"))?;
        let target: PathBuf = dest.join(relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ClipError::from_io(parent, e))?;
        }

        let file_type: fs::FileType = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ClipError::from_io(&target, e))?;

            let meta: Metadata = entry
                .metadata()
                .map_err(|_| ClipError::invalid_path(entry.path(), "metadata unavailable"))?;
            fs::set_permissions(&target, meta.permissions())
                .map_err(|e| ClipError::from_io(&target, e))?;
            preserve_times(&meta, &target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            copy_file_preserving(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, dest: &Path) -> ClipResult<()> {
    let link_target: PathBuf = fs::read_link(source).map_err(|e| ClipError::from_io(source, e))?;
    std::os::unix::fs::symlink(link_target, dest).map_err(|e| ClipError::from_io(dest, e))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, dest: &Path) -> ClipResult<()> {
    copy_file_preserving(source, dest)
}

/// Move `source` to `dest`, falling back to copy + remove across filesystems.
pub fn move_path(source: &Path, dest: &Path) -> ClipResult<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),

        Err(err) if err.kind() == ErrorKind::CrossesDevices => {
            debug!(
                source = %source.display(),
                dest = %dest.display(),
                "Rename crosses devices, copying instead"
            );

            let meta: Metadata =
                fs::symlink_metadata(source).map_err(|e| ClipError::from_io(source, e))?;

            if meta.is_dir() {
                copy_recursive(source, dest)?;
                fs::remove_dir_all(source).map_err(|e| ClipError::from_io(source, e))
            } else {
                copy_file_preserving(source, dest)?;
                fs::remove_file(source).map_err(|e| ClipError::from_io(source, e))
            }
        }

        Err(err) => Err(ClipError::from_io(source, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_unique_destination_free_name() {
        let dir = TempDir::new().unwrap();
        let dest = unique_destination(dir.path(), OsStr::new("a.txt"), false);
        assert_eq!(dest, dir.path().join("a.txt"));
    }

    #[test]
    fn test_unique_destination_counts_up() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();
        fs::write(dir.path().join("a (1).txt"), b"2").unwrap();

        let dest = unique_destination(dir.path(), OsStr::new("a.txt"), false);
        assert_eq!(dest, dir.path().join("a (2).txt"));
    }

    #[test]
    fn test_unique_destination_name_shapes() {
        let dir = TempDir::new().unwrap();
        for name in ["archive.tar.gz", ".bashrc", "photos.d", "README"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let pick = |name: &str, is_dir: bool| -> PathBuf {
            unique_destination(dir.path(), OsStr::new(name), is_dir)
        };

        assert_eq!(pick("archive.tar.gz", false), dir.path().join("archive.tar (1).gz"));
        assert_eq!(pick(".bashrc", false), dir.path().join(".bashrc (1)"));
        assert_eq!(pick("photos.d", true), dir.path().join("photos.d (1)"));
        assert_eq!(pick("README", false), dir.path().join("README (1)"));
    }

    #[test]
    fn test_copy_file_preserves_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, b"payload").unwrap();

        let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(86_400));
        filetime::set_file_mtime(&src, old).unwrap();

        let dst = dir.path().join("dst.bin");
        copy_file_preserving(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"payload");
        let copied = FileTime::from_last_modification_time(&fs::metadata(&dst).unwrap());
        assert_eq!(copied.unix_seconds(), old.unix_seconds());
    }

    #[test]
    fn test_copy_recursive_reproduces_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir_all(src.join("nested/deeper")).unwrap();
        fs::create_dir(src.join("empty")).unwrap();
        fs::write(src.join("top.txt"), b"top").unwrap();
        fs::write(src.join("nested/deeper/leaf.txt"), b"leaf").unwrap();

        let dst = dir.path().join("copy");
        copy_recursive(&src, &dst).unwrap();

        assert_eq!(fs::read(dst.join("top.txt")).unwrap(), b"top");
        assert_eq!(fs::read(dst.join("nested/deeper/leaf.txt")).unwrap(), b"leaf");
        assert!(dst.join("empty").is_dir());
        assert!(src.join("top.txt").exists());
    }

    #[test]
    fn test_move_path_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"a").unwrap();

        let dst = dir.path().join("b.txt");
        move_path(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"a");
    }

    #[test]
    fn test_execute_paste_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(dir.path().join("ok.txt"), b"ok").unwrap();

        let items = vec![
            ClipboardItem::new_copy(dir.path().join("missing.txt")),
            ClipboardItem::new_copy(dir.path().join("ok.txt")),
        ];

        let outcomes = execute_paste(&items, &target);
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].result, Err(ClipError::NotFound { .. })));
        assert_eq!(outcomes[1].destination(), Some(target.join("ok.txt").as_path()));
    }

    #[test]
    fn test_paste_directory_into_itself_is_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("folder");
        fs::create_dir_all(src.join("inner")).unwrap();

        let outcomes = execute_paste(&[ClipboardItem::new_copy(src.clone())], &src.join("inner"));
        assert!(matches!(outcomes[0].result, Err(ClipError::InvalidPath { .. })));
        assert!(!src.join("inner/folder").exists());
    }
}
