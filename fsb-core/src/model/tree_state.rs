//! ``src/model/tree_state.rs``
//! ============================================================================
//! # `DirectoryTreeModel`: lazily expanded folder hierarchy
//!
//! Nodes live in an arena and refer to each other by `NodeId`. A node's
//! children are either `Unloaded` (never read) or `Loaded` with every
//! directory child, sorted case-insensitively. Loading is the only transition
//! out of `Unloaded`.
//!
//! Expanding a loaded node again keeps the ids (and loaded subtrees) of
//! children that still exist. Subtrees of vanished directories are released
//! and their slots reused, so the arena never outgrows the live tree. An id
//! of a released node may later name a different directory.

use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::fs::dir_scanner::list_directory;
use crate::fs::file_entry::FileEntry;
use crate::fs::roots::RootEnumerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    /// Not read from the filesystem yet.
    Unloaded,

    /// Every directory child, case-insensitively sorted.
    Loaded(Vec<NodeId>),
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Path component for children, the full root path for roots.
    pub name: OsString,
    pub parent: Option<NodeId>,
    pub children: Children,
    pub expanded: bool,
}

impl TreeNode {
    fn new(name: OsString, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            children: Children::Unloaded,
            expanded: false,
        }
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }

    #[inline]
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self.children, Children::Loaded(_))
    }
}

pub struct DirectoryTreeModel {
    /// One slot per id; `None` once the node has been released.
    nodes: Vec<Option<TreeNode>>,
    free: Vec<usize>,
    roots: Vec<NodeId>,
    selected: Option<NodeId>,
    show_hidden: bool,
    enumerator: Arc<dyn RootEnumerator>,
}

impl DirectoryTreeModel {
    pub fn new(enumerator: Arc<dyn RootEnumerator>, show_hidden: bool) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            selected: None,
            show_hidden,
            enumerator,
        }
    }

    /// Discard the whole tree and start again from the platform roots.
    pub fn build_root(&mut self) -> &[NodeId] {
        self.nodes.clear();
        self.free.clear();
        self.selected = None;

        let root_paths: Vec<PathBuf> = self.enumerator.enumerate_roots();
        let roots: Vec<NodeId> = root_paths
            .into_iter()
            .map(|root: PathBuf| -> NodeId { self.alloc(TreeNode::new(root.into_os_string(), None)) })
            .collect();
        self.roots = roots;

        debug!(roots = self.roots.len(), "Tree rebuilt from roots");

        &self.roots
    }

    /// Read a node's children from disk and mark it expanded.
    ///
    /// On failure the node keeps its previous children (`Unloaded` for a
    /// fresh node) so a later expand can retry.
    pub fn expand(&mut self, id: NodeId) -> AppResult<()> {
        if self.node(id).is_none() {
            warn!(?id, "Expand requested for unknown tree node");
            return Ok(());
        }

        self.load_children(id)
    }

    pub fn collapse(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.expanded = false;
        }
    }

    fn load_children(&mut self, id: NodeId) -> AppResult<()> {
        let Some(path) = self.get_path(id) else {
            return Ok(());
        };

        let child_names: Vec<OsString> = list_directory(&path, self.show_hidden)?
            .into_iter()
            .filter(|entry: &FileEntry| -> bool { entry.is_directory })
            .filter_map(|entry: FileEntry| -> Option<OsString> {
                entry.path.file_name().map(OsStr::to_os_string)
            })
            .collect();

        let previous: Vec<NodeId> = self.children(id).map(<[NodeId]>::to_vec).unwrap_or_default();
        let present: HashSet<&OsStr> = child_names.iter().map(OsString::as_os_str).collect();

        let mut kept: HashMap<OsString, NodeId> = HashMap::new();
        let mut released: usize = 0;

        for child in previous {
            let name: Option<OsString> =
                self.node(child).map(|node: &TreeNode| -> OsString { node.name.clone() });

            match name {
                Some(name) if present.contains(name.as_os_str()) => {
                    kept.insert(name, child);
                }

                _ => released += self.release(child),
            }
        }

        // Selection inside a released subtree falls back to this node.
        if self.selected.is_some_and(|selected: NodeId| -> bool { self.node(selected).is_none() }) {
            self.selected = Some(id);
        }

        let children: Vec<NodeId> = child_names
            .into_iter()
            .map(|name: OsString| -> NodeId {
                match kept.remove(&name) {
                    Some(existing) => existing,
                    None => self.alloc(TreeNode::new(name, Some(id))),
                }
            })
            .collect();

        debug!(
            operation_type = "tree_expand",
            path = %path.display(),
            children = children.len(),
            released,
            "Tree node loaded"
        );

        if let Some(node) = self.node_mut(id) {
            node.children = Children::Loaded(children);
            node.expanded = true;
        }

        Ok(())
    }

    /// Walk from the matching root towards `path`, expanding every ancestor.
    ///
    /// Levels that are already loaded are reused, and only re-read when the
    /// next component is missing from them.
    ///
    /// Selects and returns the deepest node that could be resolved. Stops
    /// early on a missing or unreadable component. `None` when no root
    /// contains `path`.
    pub fn expand_to(&mut self, path: &Path) -> Option<NodeId> {
        if self.roots.is_empty() {
            self.build_root();
        }

        let (root_id, root_path) = self
            .roots
            .iter()
            .filter_map(|id: &NodeId| -> Option<(NodeId, PathBuf)> {
                self.node(*id).map(|node: &TreeNode| -> (NodeId, PathBuf) { (*id, PathBuf::from(&node.name)) })
            })
            .filter(|(_, root): &(NodeId, PathBuf)| -> bool { path.starts_with(root) })
            .max_by_key(|(_, root): &(NodeId, PathBuf)| -> usize { root.components().count() })?;

        let relative: &Path = path.strip_prefix(&root_path).ok()?;
        let mut current: NodeId = root_id;

        for component in relative.components() {
            let name: &OsStr = match component {
                Component::Normal(name) => name,
                Component::CurDir => continue,
                _ => break,
            };

            let was_loaded: bool = self.node(current).is_some_and(TreeNode::is_loaded);
            let loaded: AppResult<()> = if was_loaded {
                if let Some(node) = self.node_mut(current) {
                    node.expanded = true;
                }
                Ok(())
            } else {
                self.load_children(current)
            };

            if let Err(err) = loaded {
                debug!(path = %path.display(), error = %err, "Stopped descending");
                break;
            }

            let mut child: Option<NodeId> = self.find_child(current, name);

            // Directory may have appeared since this level was read.
            if child.is_none() && was_loaded && self.load_children(current).is_ok() {
                child = self.find_child(current, name);
            }

            match child {
                Some(child) => current = child,
                None => break,
            }
        }

        self.selected = Some(current);
        Some(current)
    }

    fn find_child(&self, parent: NodeId, name: &OsStr) -> Option<NodeId> {
        let children: &[NodeId] = self.children(parent)?;

        let exact: Option<NodeId> = children.iter().copied().find(|child: &NodeId| -> bool {
            self.node(*child).is_some_and(|node: &TreeNode| -> bool { node.name.as_os_str() == name })
        });

        if exact.is_some() || !cfg!(windows) {
            return exact;
        }

        let wanted: String = name.to_string_lossy().to_lowercase();
        children.iter().copied().find(|child: &NodeId| -> bool {
            self.node(*child).is_some_and(|node: &TreeNode| -> bool {
                node.name.to_string_lossy().to_lowercase() == wanted
            })
        })
    }

    /// Absolute path of a node, rebuilt by walking its parent chain.
    #[must_use]
    pub fn get_path(&self, id: NodeId) -> Option<PathBuf> {
        let mut chain: SmallVec<[&OsStr; 16]> = SmallVec::new();
        let mut current: &TreeNode = self.node(id)?;

        while let Some(parent) = current.parent {
            chain.push(&current.name);
            current = self.node(parent)?;
        }

        let mut path: PathBuf = PathBuf::from(&current.name);
        for name in chain.iter().rev() {
            path.push(name);
        }

        Some(path)
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Loaded children of a node; `None` while it is still unloaded.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Option<&[NodeId]> {
        match &self.node(id)?.children {
            Children::Loaded(children) => Some(children),
            Children::Unloaded => None,
        }
    }

    #[must_use]
    pub const fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn select(&mut self, id: NodeId) {
        if self.node(id).is_some() {
            self.selected = Some(id);
        }
    }

    /// Nodes currently held by the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth-first list of visible nodes with their depth, for rendering.
    #[must_use]
    pub fn visible_nodes(&self) -> Vec<(usize, NodeId)> {
        let mut out: Vec<(usize, NodeId)> = Vec::new();
        let mut stack: Vec<(usize, NodeId)> =
            self.roots.iter().rev().map(|id: &NodeId| -> (usize, NodeId) { (0, *id) }).collect();

        while let Some((depth, id)) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            out.push((depth, id));

            if let (true, Children::Loaded(children)) = (node.expanded, &node.children) {
                stack.extend(children.iter().rev().map(|c: &NodeId| -> (usize, NodeId) { (depth + 1, *c) }));
            }
        }

        out
    }

    fn alloc(&mut self, node: TreeNode) -> NodeId {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = Some(node);
            return NodeId(slot);
        }

        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    /// Free a node and its whole loaded subtree. Returns how many slots were freed.
    fn release(&mut self, id: NodeId) -> usize {
        let mut pending: Vec<NodeId> = vec![id];
        let mut freed: usize = 0;

        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) else {
                continue;
            };

            if let Children::Loaded(children) = node.children {
                pending.extend(children);
            }

            self.free.push(current.0);
            freed += 1;
        }

        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::roots::FixedRoots;
    use std::fs;
    use tempfile::TempDir;

    fn tree_over(dir: &Path) -> DirectoryTreeModel {
        let mut tree = DirectoryTreeModel::new(
            Arc::new(FixedRoots(vec![dir.to_path_buf()])),
            false,
        );
        tree.build_root();
        tree
    }

    fn child_names(tree: &DirectoryTreeModel, id: NodeId) -> Vec<String> {
        tree.children(id)
            .unwrap()
            .iter()
            .map(|c| tree.node(*c).unwrap().display_name())
            .collect()
    }

    #[test]
    fn test_root_starts_unloaded() {
        let dir = TempDir::new().unwrap();
        let tree = tree_over(dir.path());

        let root = tree.roots()[0];
        assert!(tree.children(root).is_none());
        assert!(!tree.node(root).unwrap().expanded);
    }

    #[test]
    fn test_expand_loads_sorted_directories_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::create_dir(dir.path().join("Alpha")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("file.txt"), b"").unwrap();

        let mut tree = tree_over(dir.path());
        let root = tree.roots()[0];
        tree.expand(root).unwrap();

        assert_eq!(child_names(&tree, root), vec!["Alpha", "beta"]);
        assert!(tree.node(root).unwrap().expanded);
    }

    #[test]
    fn test_get_path_joins_chain() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();

        let mut tree = tree_over(dir.path());
        let node = tree.expand_to(&dir.path().join("a/b")).unwrap();

        assert_eq!(tree.get_path(node).unwrap(), dir.path().join("a/b"));
        assert_eq!(tree.selected(), Some(node));
    }

    #[test]
    fn test_expand_to_stops_at_deepest_existing_ancestor() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();

        let mut tree = tree_over(dir.path());
        let node = tree.expand_to(&dir.path().join("a/b/missing/deeper")).unwrap();

        assert_eq!(tree.get_path(node).unwrap(), dir.path().join("a/b"));
    }

    #[test]
    fn test_expand_to_outside_roots_is_none() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();

        let mut tree = tree_over(dir.path());
        assert!(tree.expand_to(other.path()).is_none());
    }

    #[test]
    fn test_failed_expand_stays_unloaded() {
        let dir = TempDir::new().unwrap();
        let mut tree = tree_over(&dir.path().join("vanished"));
        let root = tree.roots()[0];

        assert!(tree.expand(root).is_err());
        assert!(tree.children(root).is_none());
    }

    #[test]
    fn test_expand_again_replaces_children() {
        let dir = TempDir::new().unwrap();
        let mut tree = tree_over(dir.path());
        let root = tree.roots()[0];
        tree.expand(root).unwrap();
        assert!(tree.children(root).unwrap().is_empty());

        fs::create_dir(dir.path().join("late")).unwrap();
        tree.expand(root).unwrap();
        assert_eq!(child_names(&tree, root), vec!["late"]);
    }

    #[test]
    fn test_repeated_expand_keeps_arena_bounded() {
        let dir = TempDir::new().unwrap();
        for i in 0..10 {
            fs::create_dir(dir.path().join(format!("d{i}"))).unwrap();
        }

        let mut tree = tree_over(dir.path());
        let root = tree.roots()[0];
        tree.expand(root).unwrap();
        let first: Vec<NodeId> = tree.children(root).unwrap().to_vec();

        for _ in 0..1000 {
            tree.expand(root).unwrap();
        }

        assert_eq!(tree.nodes.len(), 11);
        assert_eq!(tree.len(), 11);
        assert_eq!(tree.children(root).unwrap(), first.as_slice());
    }

    #[test]
    fn test_vanished_subtree_is_released_and_reused() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("old/deep")).unwrap();
        fs::create_dir(dir.path().join("keep")).unwrap();

        let mut tree = tree_over(dir.path());
        let deep = tree.expand_to(&dir.path().join("old/deep")).unwrap();
        let root = tree.roots()[0];
        let keep = tree.find_child(root, OsStr::new("keep")).unwrap();
        assert_eq!(tree.len(), 4);

        fs::rename(dir.path().join("old"), dir.path().join("new")).unwrap();
        tree.expand(root).unwrap();

        assert_eq!(child_names(&tree, root), vec!["keep", "new"]);
        assert_eq!(tree.find_child(root, OsStr::new("keep")), Some(keep));
        assert_eq!(tree.len(), 3);
        assert!(tree.nodes.len() <= 4);
        assert_eq!(tree.selected(), Some(root));
        assert!(tree.node(deep).is_none_or(|node| node.name != "deep"));
    }

    #[test]
    fn test_reexpand_keeps_loaded_grandchildren() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/inner")).unwrap();

        let mut tree = tree_over(dir.path());
        let inner = tree.expand_to(&dir.path().join("a/inner")).unwrap();
        let root = tree.roots()[0];

        fs::create_dir(dir.path().join("b")).unwrap();
        tree.expand(root).unwrap();

        assert_eq!(child_names(&tree, root), vec!["a", "b"]);
        assert_eq!(tree.get_path(inner).unwrap(), dir.path().join("a/inner"));
        assert_eq!(tree.visible_nodes().len(), 4);
    }

    #[test]
    fn test_visible_nodes_follow_expansion() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/inner")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();

        let mut tree = tree_over(dir.path());
        tree.expand_to(&dir.path().join("a/inner"));

        let depths: Vec<usize> = tree.visible_nodes().iter().map(|(d, _)| *d).collect();
        assert_eq!(depths, vec![0, 1, 2, 1]);

        let root = tree.roots()[0];
        tree.collapse(root);
        assert_eq!(tree.visible_nodes().len(), 1);
    }
}
