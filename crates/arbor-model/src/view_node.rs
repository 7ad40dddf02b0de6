#![forbid(unsafe_code)]

//! Identity-stable view node handles.
//!
//! A [`ViewNode`] wraps one domain node for as long as that domain node is
//! present under the same parent. It owns a cancellation scope nested under
//! its parent's, a lifecycle, and two latest-wins cells: the presentation
//! and the child list. Cloning a `ViewNode` clones the handle; equality is
//! identity.
//!
//! Disposal happens exactly when the node's scope is cancelled: the
//! lifecycle becomes `Disposed`, both cells close (waiters resolve to
//! `None` if nothing was ever produced), and the node leaves the registry.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use arbor_core::{
    DomainNode, Latest, NodeId, NodeLifecycle, Presentation, Scope, consistency_violation,
};
use futures::stream::BoxStream;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Callbacks from a node handle into its owning model.
pub(crate) trait NodeLoader<N: DomainNode>: Send + Sync {
    /// Start the first children load if none was ever requested.
    fn ensure_children_loading(&self, node: &ViewNode<N>);
}

/// Per-node bookkeeping guarded by one lock.
#[derive(Debug, Default)]
pub(crate) struct LoadState {
    /// Generation of the latest presentation request.
    pub(crate) presentation_generation: u64,
    /// First production is running.
    pub(crate) first_running: bool,
    /// First production finished (successfully).
    pub(crate) first_done: bool,
    /// A refresh arrived during the first production.
    pub(crate) refresh_pending: bool,
    /// Scope of the in-flight later production.
    pub(crate) production: Option<Scope>,
    /// Generation of the latest children request.
    pub(crate) children_generation: u64,
    /// Children were requested at least once.
    pub(crate) children_requested: bool,
    /// Scope of the in-flight children load.
    pub(crate) children_load: Option<Scope>,
}

pub(crate) struct ViewNodeInner<N: DomainNode> {
    pub(crate) id: NodeId,
    pub(crate) domain: N,
    pub(crate) parent_id: Option<NodeId>,
    pub(crate) depth: usize,
    pub(crate) scope: Scope,
    pub(crate) lifecycle: watch::Sender<NodeLifecycle>,
    pub(crate) presentation: Latest<Presentation>,
    pub(crate) children: Latest<Arc<[ViewNode<N>]>>,
    pub(crate) load: Mutex<LoadState>,
    pub(crate) loader: Weak<dyn NodeLoader<N>>,
}

/// Cached, lazily populated handle for one domain node.
pub struct ViewNode<N: DomainNode> {
    pub(crate) inner: Arc<ViewNodeInner<N>>,
}

impl<N: DomainNode> Clone for ViewNode<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N: DomainNode> ViewNode<N> {
    pub(crate) fn new(
        domain: N,
        parent: Option<&ViewNode<N>>,
        parent_scope: &Scope,
        loader: Weak<dyn NodeLoader<N>>,
    ) -> Self {
        let id = NodeId::next();
        let scope = parent_scope.child(format!("node-{}", id.get()));
        let (lifecycle, _) = watch::channel(NodeLifecycle::Created);
        let node = Self {
            inner: Arc::new(ViewNodeInner {
                id,
                domain,
                parent_id: parent.map(ViewNode::id),
                depth: parent.map_or(0, |p| p.depth() + 1),
                scope,
                lifecycle,
                presentation: Latest::new(),
                children: Latest::new(),
                load: Mutex::new(LoadState::default()),
                loader,
            }),
        };
        let weak = Arc::downgrade(&node.inner);
        node.inner.scope.on_cancel(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lifecycle.send_replace(NodeLifecycle::Disposed);
                inner.presentation.close();
                inner.children.close();
                tracing::trace!(node_id = inner.id.get(), "view node disposed");
            }
        });
        tracing::trace!(node_id = id.get(), parent_id = ?node.inner.parent_id.map(NodeId::get), "view node created");
        node
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The wrapped domain node.
    #[must_use]
    pub fn domain(&self) -> &N {
        &self.inner.domain
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<NodeId> {
        self.inner.parent_id
    }

    /// Distance from the root (the root has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// The node's scope; cancelled exactly when the node is disposed.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    #[must_use]
    pub fn lifecycle(&self) -> NodeLifecycle {
        *self.inner.lifecycle.borrow()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle().is_disposed()
    }

    /// Receiver observing lifecycle changes.
    #[must_use]
    pub fn watch_lifecycle(&self) -> watch::Receiver<NodeLifecycle> {
        self.inner.lifecycle.subscribe()
    }

    /// Presentation as currently known, without waiting.
    #[must_use]
    pub fn presentation_now(&self) -> Option<Presentation> {
        self.inner.presentation.current()
    }

    /// Wait for the first completed presentation, then return the latest
    /// one. `None` if the node was disposed before any presentation existed.
    pub async fn current_presentation(&self) -> Option<Presentation> {
        self.inner.presentation.ready().await
    }

    /// Stream of presentation updates, latest wins.
    #[must_use]
    pub fn watch_presentation(&self) -> BoxStream<'static, Presentation> {
        self.inner.presentation.subscribe()
    }

    /// Children as currently known, without waiting or loading.
    #[must_use]
    pub fn children_now(&self) -> Option<Vec<ViewNode<N>>> {
        self.inner.children.current().map(|c| c.to_vec())
    }

    /// Whether a children list has been delivered.
    #[must_use]
    pub fn children_loaded(&self) -> bool {
        self.inner.children.is_ready()
    }

    /// Whether children were ever requested.
    #[must_use]
    pub fn children_requested(&self) -> bool {
        self.inner.load.lock().children_requested
    }

    /// Load children if needed and wait for the first list. `None` if the
    /// node was disposed first.
    pub async fn current_children(&self) -> Option<Vec<ViewNode<N>>> {
        if !self.children_loaded() {
            match self.inner.loader.upgrade() {
                Some(loader) => loader.ensure_children_loading(self),
                None => return self.children_now(),
            }
        }
        self.inner.children.ready().await.map(|c| c.to_vec())
    }

    /// Wait until the node left `Created`. Returns `false` if it was
    /// disposed instead.
    pub async fn wait_loaded(&self) -> bool {
        let mut rx = self.inner.lifecycle.subscribe();
        match rx.wait_for(|l| *l != NodeLifecycle::Created).await {
            Ok(state) => !state.is_disposed(),
            Err(_) => false,
        }
    }

    /// Wait until the node is published. Returns `false` if it was disposed
    /// instead.
    pub async fn wait_published(&self) -> bool {
        let mut rx = self.inner.lifecycle.subscribe();
        match rx
            .wait_for(|l| matches!(l, NodeLifecycle::Published | NodeLifecycle::Disposed))
            .await
        {
            Ok(state) => !state.is_disposed(),
            Err(_) => false,
        }
    }

    /// Advance the lifecycle. Returns whether the state changed.
    ///
    /// Updates to a disposed node are dropped silently; any other illegal
    /// transition is a consistency violation.
    pub(crate) fn advance(&self, next: NodeLifecycle) -> bool {
        let mut violation = None;
        let changed = self.inner.lifecycle.send_if_modified(|state| {
            if *state == next || state.is_disposed() {
                return false;
            }
            if !state.can_transition_to(next) {
                violation = Some(*state);
                return false;
            }
            *state = next;
            true
        });
        if let Some(from) = violation {
            tracing::debug!(node_id = self.id().get(), %from, to = %next, "rejected lifecycle transition");
            consistency_violation("invalid lifecycle transition");
        }
        changed
    }

    /// Mark the node as announced to the widget.
    pub fn mark_published(&self) -> bool {
        self.advance(NodeLifecycle::Published)
    }

    /// Dispose the node and its whole subtree.
    pub fn dispose(&self) {
        self.inner.scope.cancel();
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &ViewNode<N>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<N: DomainNode> PartialEq for ViewNode<N> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<N: DomainNode> Eq for ViewNode<N> {}

impl<N: DomainNode> Hash for ViewNode<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<N: DomainNode> fmt::Debug for ViewNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewNode")
            .field("id", &self.inner.id)
            .field("domain", &self.inner.domain)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoLoader;

    impl NodeLoader<u32> for NoLoader {
        fn ensure_children_loading(&self, _node: &ViewNode<u32>) {}
    }

    fn detached(domain: u32, scope: &Scope) -> ViewNode<u32> {
        let loader: Weak<dyn NodeLoader<u32>> = Weak::<NoLoader>::new();
        ViewNode::new(domain, None, scope, loader)
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        let scope = Scope::root("t");
        let node = detached(1, &scope);
        assert_eq!(node.lifecycle(), NodeLifecycle::Created);
        assert!(!node.mark_published());
        assert!(node.advance(NodeLifecycle::Loaded));
        assert!(node.mark_published());
        assert!(!node.advance(NodeLifecycle::Loaded));
        assert_eq!(node.lifecycle(), NodeLifecycle::Published);
    }

    #[test]
    fn parent_scope_cancel_disposes() {
        let scope = Scope::root("t");
        let node = detached(1, &scope);
        scope.cancel();
        assert!(node.is_disposed());
        assert!(node.inner.presentation.is_closed());
        assert!(!node.advance(NodeLifecycle::Loaded));
    }

    #[tokio::test]
    async fn disposed_before_value_yields_none() {
        let scope = Scope::root("t");
        let node = detached(1, &scope);
        let n = node.clone();
        let waiter = tokio::spawn(async move { n.current_presentation().await });
        node.dispose();
        assert_eq!(waiter.await.unwrap(), None);
        assert!(!node.wait_loaded().await);
    }

    #[test]
    fn equality_is_identity() {
        let scope = Scope::root("t");
        let a = detached(1, &scope);
        let b = detached(1, &scope);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
