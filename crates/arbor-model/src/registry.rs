#![forbid(unsafe_code)]

//! Identity registry of live view nodes.
//!
//! Keyed by `(parent id, domain node)`: a domain node reappearing under the
//! same parent maps to the same [`ViewNode`]. Lookup-or-insert runs under a
//! single lock, so two concurrent loads of one parent never create two
//! handles for one domain node. Entries leave the registry from the node's
//! on-cancel callback, compared by [`NodeId`] so a stale callback never
//! evicts a newer handle for the same key.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use arbor_core::{DomainNode, NodeId};
use parking_lot::Mutex;

use crate::view_node::ViewNode;

type Key<N> = (Option<NodeId>, N);

/// Map of live view nodes.
pub(crate) struct Registry<N: DomainNode> {
    entries: Mutex<HashMap<Key<N>, ViewNode<N>>>,
}

impl<N: DomainNode> Registry<N> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Existing live node for the key, or a fresh one from `create`.
    ///
    /// Returns the node and whether it was created by this call.
    pub(crate) fn get_or_create(
        self: &Arc<Self>,
        parent: Option<NodeId>,
        domain: N,
        create: impl FnOnce(N) -> ViewNode<N>,
    ) -> (ViewNode<N>, bool) {
        let mut entries = self.entries.lock();
        let key = (parent, domain);
        if let Some(existing) = entries.get(&key) {
            if !existing.is_disposed() {
                return (existing.clone(), false);
            }
        }
        let node = create(key.1.clone());
        entries.insert(key.clone(), node.clone());
        drop(entries);

        let registry: Weak<Self> = Arc::downgrade(self);
        let id = node.id();
        node.scope().on_cancel(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(&key, id);
            }
        });
        (node, true)
    }

    pub(crate) fn get(&self, parent: Option<NodeId>, domain: &N) -> Option<ViewNode<N>> {
        self.entries
            .lock()
            .get(&(parent, domain.clone()))
            .filter(|n| !n.is_disposed())
            .cloned()
    }

    fn remove(&self, key: &Key<N>, id: NodeId) {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|n| n.id() == id) {
            entries.remove(key);
        }
    }

    /// Live nodes registered under `parent`.
    pub(crate) fn children_of(&self, parent: Option<NodeId>) -> Vec<ViewNode<N>> {
        self.entries
            .lock()
            .iter()
            .filter(|((p, _), _)| *p == parent)
            .map(|(_, node)| node.clone())
            .collect()
    }

    pub(crate) fn contains_id(&self, id: NodeId) -> bool {
        self.entries.lock().values().any(|n| n.id() == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
