use crate::item::{ClipboardItem, ClipboardOperation};
use crate::operations::{self, PasteOutcome};
use std::path::{Path, PathBuf};
use tracing::info;

/// Multi-item clipboard shared by every directory view of a session.
///
/// `set` always replaces the whole content. Copy items stay until replaced or
/// cleared; a Cut item leaves the clipboard as soon as its move succeeds.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    items: Vec<ClipboardItem>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the clipboard with `paths`, all tagged with `operation`.
    pub fn set<I>(&mut self, paths: I, operation: ClipboardOperation)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.items.clear();

        for path in paths {
            if !self.contains(&path) {
                self.items.push(ClipboardItem::new(path, operation));
            }
        }

        info!(
            operation_type = "clipboard_set",
            operation = %operation,
            items = self.items.len(),
            "Clipboard replaced"
        );
    }

    /// Get all clipboard items in order
    pub fn items(&self) -> &[ClipboardItem] {
        &self.items
    }

    /// Items by value, for handing to a background paste.
    pub fn snapshot(&self) -> Vec<ClipboardItem> {
        self.items.clone()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.items
            .iter()
            .any(|item: &ClipboardItem| -> bool { item.source_path == path })
    }

    /// Check if clipboard is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get clipboard item count
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Clear all clipboard items
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Paste every item into `target_dir` synchronously.
    ///
    /// Each item succeeds or fails on its own. The caller refreshes the
    /// listing of `target_dir` afterwards.
    pub fn paste_into(&mut self, target_dir: &Path) -> Vec<PasteOutcome> {
        let outcomes: Vec<PasteOutcome> = operations::execute_paste(&self.items, target_dir);
        self.apply_outcomes(&outcomes);
        outcomes
    }

    /// Drop Cut items whose move succeeded. Copy items are never removed.
    pub fn apply_outcomes(&mut self, outcomes: &[PasteOutcome]) {
        let moved: Vec<&Path> = outcomes
            .iter()
            .filter(|outcome: &&PasteOutcome| -> bool {
                outcome.is_success() && outcome.item.operation == ClipboardOperation::Cut
            })
            .map(|outcome| outcome.item.source())
            .collect();

        if moved.is_empty() {
            return;
        }

        self.items.retain(|item: &ClipboardItem| -> bool {
            !(item.operation == ClipboardOperation::Cut && moved.contains(&item.source()))
        });
    }

    /// Get clipboard statistics
    pub fn stats(&self) -> ClipboardStats {
        ClipboardStats::new(&self.items)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardStats {
    pub total_items: usize,
    pub copy_items: usize,
    pub cut_items: usize,
}

impl ClipboardStats {
    fn new(items: &[ClipboardItem]) -> Self {
        let cut_items: usize = items
            .iter()
            .filter(|item: &&ClipboardItem| -> bool { item.operation == ClipboardOperation::Cut })
            .count();

        Self {
            total_items: items.len(),
            copy_items: items.len() - cut_items,
            cut_items,
        }
    }
}
