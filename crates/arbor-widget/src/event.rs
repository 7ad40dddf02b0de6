#![forbid(unsafe_code)]

//! Widget-facing change notifications.
//!
//! Listeners are invoked on the foreground executor only, one event at a
//! time, after the adapter's mirror already reflects the change.

use arbor_core::{DomainNode, TreePath};

use crate::node::WidgetNode;

/// Path from the root to a widget node.
pub type WidgetPath<N> = TreePath<WidgetNode<N>>;

/// Nodes removed, inserted or changed under one parent.
#[derive(Debug, Clone)]
pub struct TreeModelEvent<N: DomainNode> {
    /// Path of the parent.
    pub path: WidgetPath<N>,
    /// Ascending child indices (old indices for removals, new otherwise).
    pub indices: Vec<usize>,
    /// The affected nodes, one per index.
    pub nodes: Vec<WidgetNode<N>>,
}

impl<N: DomainNode> TreeModelEvent<N> {
    #[must_use]
    pub fn parent(&self) -> &WidgetNode<N> {
        self.path.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Receiver of widget model changes.
pub trait TreeModelListener<N: DomainNode>: Send + Sync {
    /// The subtree at `path` changed wholesale; `None` means the whole tree
    /// (new root, or no root).
    fn structure_changed(&self, path: Option<&WidgetPath<N>>);

    fn nodes_removed(&self, event: &TreeModelEvent<N>);

    fn nodes_inserted(&self, event: &TreeModelEvent<N>);

    fn nodes_changed(&self, event: &TreeModelEvent<N>);

    fn selection_changed(&self, _paths: &[WidgetPath<N>]) {}

    fn scroll_requested(&self, _path: &WidgetPath<N>) {}
}
