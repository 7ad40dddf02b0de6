#![forbid(unsafe_code)]

//! The adapter's mirror of published tree state.
//!
//! The mirror is what the widget reads: every query of the widget contract
//! is answered from it without waiting. It is written only by the adapter,
//! on the foreground executor, and always before the event announcing the
//! write is delivered.

use std::collections::HashMap;

use arbor_core::{DomainNode, NodeId, TreePath};

use crate::node::WidgetNode;

/// Mirror record for one node.
#[derive(Debug)]
pub(crate) struct Entry<N: DomainNode> {
    pub(crate) node: WidgetNode<N>,
    pub(crate) parent: Option<NodeId>,
    /// `None` until children were delivered (or a placeholder was shown).
    pub(crate) children: Option<Vec<WidgetNode<N>>>,
    /// A children load was requested from a read.
    pub(crate) loading: bool,
}

#[derive(Debug)]
pub(crate) struct Mirror<N: DomainNode> {
    root: Option<WidgetNode<N>>,
    entries: HashMap<NodeId, Entry<N>>,
}

impl<N: DomainNode> Mirror<N> {
    pub(crate) fn new() -> Self {
        Self {
            root: None,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn root(&self) -> Option<&WidgetNode<N>> {
        self.root.as_ref()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn entry(&self, id: NodeId) -> Option<&Entry<N>> {
        self.entries.get(&id)
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry<N>> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn children(&self, id: NodeId) -> Option<&[WidgetNode<N>]> {
        self.entries.get(&id)?.children.as_deref()
    }

    /// Every node currently mirrored.
    pub(crate) fn nodes(&self) -> impl Iterator<Item = &WidgetNode<N>> {
        self.entries.values().map(|e| &e.node)
    }

    /// Drop everything. Returns the nodes that were mirrored.
    pub(crate) fn clear(&mut self) -> Vec<WidgetNode<N>> {
        self.root = None;
        self.entries.drain().map(|(_, e)| e.node).collect()
    }

    /// Replace the whole tree with `root`. Returns the nodes dropped.
    pub(crate) fn set_root(&mut self, root: Option<WidgetNode<N>>) -> Vec<WidgetNode<N>> {
        let dropped = self.clear();
        if let Some(node) = &root {
            self.insert(node.clone(), None);
        }
        self.root = root;
        dropped
    }

    /// Add a record for `node` unless one exists.
    pub(crate) fn insert(&mut self, node: WidgetNode<N>, parent: Option<NodeId>) {
        self.entries.entry(node.id()).or_insert(Entry {
            node,
            parent,
            children: None,
            loading: false,
        });
    }

    /// Replace `parent`'s child list. Records of children that left the
    /// list are dropped with their subtrees; kept children keep theirs.
    pub(crate) fn set_children(
        &mut self,
        parent: NodeId,
        children: Vec<WidgetNode<N>>,
    ) -> Vec<WidgetNode<N>> {
        let Some(entry) = self.entries.get_mut(&parent) else {
            return Vec::new();
        };
        entry.loading = false;
        let previous = entry.children.replace(children.clone()).unwrap_or_default();
        for child in &children {
            self.insert(child.clone(), Some(parent));
        }
        let gone: Vec<NodeId> = previous
            .iter()
            .filter(|old| !children.contains(old))
            .map(WidgetNode::id)
            .collect();
        self.prune(&gone)
    }

    /// Remove the child at `index` from `parent`'s list, keeping its record.
    pub(crate) fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Option<WidgetNode<N>> {
        let list = self.entries.get_mut(&parent)?.children.as_mut()?;
        (index < list.len()).then(|| list.remove(index))
    }

    /// Insert `node` at `index` in `parent`'s list, adding a record if new.
    pub(crate) fn insert_child_at(&mut self, parent: NodeId, index: usize, node: WidgetNode<N>) {
        let Some(list) = self
            .entries
            .get_mut(&parent)
            .and_then(|e| e.children.as_mut())
        else {
            return;
        };
        let at = index.min(list.len());
        list.insert(at, node.clone());
        self.insert(node, Some(parent));
    }

    /// Drop records of `ids` and their subtrees. Returns the dropped nodes.
    pub(crate) fn prune(&mut self, ids: &[NodeId]) -> Vec<WidgetNode<N>> {
        let mut dropped = Vec::new();
        let mut stack: Vec<NodeId> = ids.to_vec();
        while let Some(id) = stack.pop() {
            if let Some(entry) = self.entries.remove(&id) {
                if let Some(children) = &entry.children {
                    stack.extend(children.iter().map(WidgetNode::id));
                }
                dropped.push(entry.node);
            }
        }
        dropped
    }

    /// Path from the root to `id`, if mirrored.
    pub(crate) fn path_of(&self, id: NodeId) -> Option<TreePath<WidgetNode<N>>> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let entry = self.entries.get(&current)?;
            chain.push(entry.node.clone());
            cursor = entry.parent;
        }
        chain.reverse();
        TreePath::from_nodes(chain)
    }

    pub(crate) fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent)?.iter().position(|c| c.id() == child)
    }

    /// Ids of `parent`'s mirrored children, `None` if none were delivered.
    pub(crate) fn child_ids(&self, parent: NodeId) -> Option<Vec<NodeId>> {
        self.children(parent)
            .map(|children| children.iter().map(WidgetNode::id).collect())
    }
}
