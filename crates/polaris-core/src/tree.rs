//! In-memory project tree with per-node fetch and view state.
//!
//! The [`TreeStore`] owns every [`TreeNode`] of one project in an arena and hands
//! out [`NodeId`]s. Nodes are created only when their parent directory's
//! listing is attached, and are never removed individually: the whole tree is
//! discarded by [`TreeStore::reset`] when the project changes.
//!
//! ## Node States
//!
//! - **Fetch state**: `Unfetched -> Fetched`, one way. A fetched node's children
//!   are cached for the lifetime of the tree.
//! - **View state**: `Collapsed <-> Expanded`, a pure presentation flag. Collapsing
//!   never drops fetched children.
//!
//! Node ids carry the tree's epoch, so an id that outlives a reset resolves to
//! nothing instead of to an unrelated node of the new tree.

use serde::Serialize;

use crate::text::base_name;
use crate::types::{FileHandle, FileKind};

// ============================================================================
// Identifiers and States
// ============================================================================

/// Handle to a node of a [`TreeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    epoch: u32,
    index: u32,
}

/// Whether a directory's children have been loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchState {
    Unfetched,
    Fetched,
}

/// Whether a node's children are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewState {
    Collapsed,
    Expanded,
}

// ============================================================================
// TreeNode
// ============================================================================

/// One directory or file of the project tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    path: String,
    kind: FileKind,
    handle: Option<FileHandle>,
    parent: Option<NodeId>,
    children: Option<Vec<NodeId>>,
    state: FetchState,
    view: ViewState,
}

impl TreeNode {
    fn root() -> Self {
        TreeNode {
            path: "/".to_string(),
            kind: FileKind::Directory,
            handle: None,
            parent: None,
            children: None,
            state: FetchState::Unfetched,
            view: ViewState::Collapsed,
        }
    }

    fn from_handle(handle: FileHandle, parent: NodeId) -> Self {
        let state = match handle.kind {
            FileKind::Directory => FetchState::Unfetched,
            // Files have no listing to fetch.
            FileKind::NormalFile => FetchState::Fetched,
        };
        let children = match handle.kind {
            FileKind::Directory => None,
            FileKind::NormalFile => Some(Vec::new()),
        };
        TreeNode {
            path: handle.path.clone(),
            kind: handle.kind,
            handle: Some(handle),
            parent: Some(parent),
            children,
            state,
            view: ViewState::Collapsed,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name shown in the tree; empty for the root.
    pub fn name(&self) -> &str {
        base_name(&self.path)
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// The handle this node was created from; `None` for the root.
    pub fn handle(&self) -> Option<&FileHandle> {
        self.handle.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in display order, or `None` when not yet fetched.
    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn is_fetched(&self) -> bool {
        self.state == FetchState::Fetched
    }

    pub fn is_expanded(&self) -> bool {
        self.view == ViewState::Expanded
    }
}

/// A row of the rendered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub node: NodeId,
}

// ============================================================================
// TreeStore
// ============================================================================

/// Arena of tree nodes for one project.
#[derive(Debug, Clone)]
pub struct TreeStore {
    project: String,
    epoch: u32,
    nodes: Vec<TreeNode>,
}

impl TreeStore {
    /// Create a tree holding only the unfetched root directory `/`.
    pub fn new(project: impl Into<String>) -> Self {
        TreeStore {
            project: project.into(),
            epoch: 0,
            nodes: vec![TreeNode::root()],
        }
    }

    /// Discard every node and start over for `project`.
    pub fn reset(&mut self, project: impl Into<String>) {
        self.project = project.into();
        self.epoch = self.epoch.wrapping_add(1);
        self.nodes.clear();
        self.nodes.push(TreeNode::root());
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn root(&self) -> NodeId {
        self.id_at(0)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        if id.epoch != self.epoch {
            return None;
        }
        self.nodes.get(id.index as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        if id.epoch != self.epoch {
            return None;
        }
        self.nodes.get_mut(id.index as usize)
    }

    fn id_at(&self, index: usize) -> NodeId {
        NodeId {
            epoch: self.epoch,
            index: index as u32,
        }
    }

    /// Attach a fetched directory listing to `id` and mark it fetched.
    ///
    /// Children are ordered directories first, then by project, then by path.
    /// Attaching to a node that is already fetched leaves it unchanged, so a
    /// late duplicate response never duplicates children. Returns `false` when
    /// `id` does not belong to this tree.
    pub fn attach_children(&mut self, id: NodeId, mut handles: Vec<FileHandle>) -> bool {
        match self.node(id) {
            None => return false,
            Some(node) if node.is_fetched() => return true,
            Some(_) => {}
        }
        handles.sort_by(|a, b| a.display_cmp(b));
        let first = self.nodes.len();
        self.nodes
            .extend(handles.into_iter().map(|h| TreeNode::from_handle(h, id)));
        let ids: Vec<NodeId> = (first..self.nodes.len()).map(|i| self.id_at(i)).collect();
        if let Some(node) = self.node_mut(id) {
            node.children = Some(ids);
            node.state = FetchState::Fetched;
        }
        true
    }

    /// Children of `id` whose name equals `name`.
    pub fn children_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        let Some(children) = self.node(id).and_then(TreeNode::children) else {
            return Vec::new();
        };
        children
            .iter()
            .copied()
            .filter(|&child| self.node(child).is_some_and(|n| n.name() == name))
            .collect()
    }

    /// Show the children of `id`.
    pub fn mark_expanded(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.view = ViewState::Expanded;
        }
    }

    /// Hide the children of `id`. Fetched children stay cached.
    pub fn collapse(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.view = ViewState::Collapsed;
        }
    }

    /// Flip the view state of `id`, returning the new state.
    pub fn toggle(&mut self, id: NodeId) -> Option<ViewState> {
        let node = self.node_mut(id)?;
        node.view = match node.view {
            ViewState::Collapsed => ViewState::Expanded,
            ViewState::Expanded => ViewState::Collapsed,
        };
        Some(node.view)
    }

    /// Path of `id`, if it belongs to this tree.
    pub fn path_of(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(TreeNode::path)
    }

    /// Children of `id`; `None` until its listing is fetched.
    pub fn children(&self, id: NodeId) -> Option<&[NodeId]> {
        self.node(id).and_then(TreeNode::children)
    }

    /// Find a loaded node by path. A trailing `/` is ignored.
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let wanted = normalize(path);
        self.nodes
            .iter()
            .position(|node| normalize(&node.path) == wanted)
            .map(|i| self.id_at(i))
    }

    /// Rows a renderer shows: every node reachable from the root through
    /// expanded directories, depth-first, in display order. The root itself is
    /// not a row.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        self.push_rows(self.root(), 0, &mut rows);
        rows
    }

    fn push_rows(&self, id: NodeId, depth: usize, rows: &mut Vec<TreeRow>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if !node.is_expanded() {
            return;
        }
        for &child in node.children().unwrap_or(&[]) {
            rows.push(TreeRow { depth, node: child });
            self.push_rows(child, depth + 1, rows);
        }
    }
}

fn normalize(path: &str) -> &str {
    if path == "/" {
        path
    } else {
        path.strip_suffix('/').unwrap_or(path)
    }
}

// ============================================================================
// Tests
// ============================================================================
