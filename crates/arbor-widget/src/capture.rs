#![forbid(unsafe_code)]

//! Capturing the shown tree as a snapshot, and rendering it as text.

use arbor_core::DomainModel;
use arbor_model::{SnapshotNode, TreeSnapshot};

use crate::adapter::TreeAdapter;
use crate::node::WidgetNode;
use crate::outline::{TreeGuides, render};

impl<M: DomainModel> TreeAdapter<M> {
    /// Capture the shown tree into a snapshot, keying live nodes with `key`.
    ///
    /// Placeholders are left out, so a node whose children are loading is
    /// captured with none. Cached nodes keep their snapshot keys. A key
    /// produced twice keeps its first node.
    #[must_use]
    pub fn capture_snapshot(&self, key: impl Fn(&M::Node) -> String) -> TreeSnapshot {
        let mirror = self.shared.mirror.lock();
        let key_of = |node: &WidgetNode<M::Node>| match node {
            WidgetNode::Live(view) => Some(key(view.domain())),
            WidgetNode::Cached(cached) => Some(cached.key().to_string()),
            WidgetNode::Placeholder(_) => None,
        };

        let mut snapshot = TreeSnapshot::new();
        let Some(root) = mirror.root() else {
            return snapshot;
        };
        let Some(root_key) = key_of(root) else {
            return snapshot;
        };
        snapshot.root = Some(root_key.clone());

        let mut stack = vec![(root_key, root.clone())];
        while let Some((node_key, node)) = stack.pop() {
            if snapshot.node(&node_key).is_some() {
                tracing::debug!(key = %node_key, "duplicate snapshot key, keeping first");
                continue;
            }
            let mut children = Vec::new();
            for child in mirror.children(node.id()).unwrap_or(&[]) {
                if let Some(child_key) = key_of(child) {
                    children.push(child_key.clone());
                    stack.push((child_key, child.clone()));
                }
            }
            snapshot.insert(
                node_key,
                SnapshotNode {
                    leaf: node.is_leaf(),
                    children,
                    presentation: node.presentation().unwrap_or_default(),
                },
            );
        }
        snapshot
    }

    /// Render the shown tree as indented text lines.
    #[must_use]
    pub fn outline(&self, guides: TreeGuides) -> Vec<String> {
        render(&self.shared.mirror.lock(), guides, None)
    }

    /// Like [`outline`](Self::outline), cutting lines to `max_width`
    /// display columns.
    #[must_use]
    pub fn outline_with_width(&self, guides: TreeGuides, max_width: usize) -> Vec<String> {
        render(&self.shared.mirror.lock(), guides, Some(max_width))
    }
}
