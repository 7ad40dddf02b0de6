#![forbid(unsafe_code)]

//! The tree view model.
//!
//! [`TreeViewModel`] wraps a [`DomainModel`] in identity-stable
//! [`ViewNode`]s and keeps them current:
//!
//! - The root is computed on demand and recomputed by
//!   [`TreeViewModel::invalidate_root`]. A recomputed root equal to the
//!   current one keeps its view node.
//! - Children are loaded on first request and reconciled against the
//!   previous list on every reload ([`crate::diff`]). Reloads are
//!   latest-wins: a new request cancels the in-flight one.
//! - Presentations are produced at node creation. The first production
//!   publishes every snapshot the domain streams and completes even if
//!   refreshes pile up meanwhile; later productions are latest-wins and
//!   publish only their final snapshot.
//!
//! Structural changes are reported to a single [`ModelListener`] (held
//! weakly), in order per parent.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Root computation fails | Logged, tree becomes empty |
//! | Children computation fails | Logged, parent gets an empty list |
//! | First presentation fails | Logged, node disposed and dropped from its parent |
//! | Refresh presentation fails | Logged, previous presentation kept |
//! | Duplicate child | Consistency violation, first occurrence kept |
//! | Request on a disposed node | Consistency violation, no-op |

use std::future::Future;
use std::sync::{Arc, Weak};

use arbor_core::{
    DomainModel, DomainNode, Executors, Latest, NodeId, Scope, TreeModelConfig,
    consistency_violation,
};
use arbor_walk::{WalkOutcome, find, walk};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::diff::ChangeSet;
use crate::registry::Registry;
use crate::source::ViewModelWalkSource;
use crate::view_node::{NodeLoader, ViewNode};

/// Receiver of view model changes.
///
/// Callbacks run on background tasks while the model holds the affected
/// parent's lock; implementations must only enqueue work.
pub trait ModelListener<N: DomainNode>: Send + Sync + 'static {
    /// The root was replaced (either side may be `None`).
    fn root_changed(&self, old: Option<ViewNode<N>>, new: Option<ViewNode<N>>);

    /// The children of `parent` were (re)loaded.
    fn children_changed(&self, parent: &ViewNode<N>, changes: ChangeSet<ViewNode<N>>);

    /// A published node received a new presentation.
    fn presentation_changed(&self, _node: &ViewNode<N>) {}
}

pub(crate) struct RootState<N: DomainNode> {
    pub(crate) generation: u64,
    pub(crate) requested: bool,
    pub(crate) current: Option<ViewNode<N>>,
    pub(crate) load: Option<Scope>,
}

pub(crate) struct Shared<M: DomainModel> {
    pub(crate) this: Weak<Shared<M>>,
    pub(crate) domain: Arc<M>,
    pub(crate) executors: Executors,
    pub(crate) config: TreeModelConfig,
    pub(crate) scope: Scope,
    pub(crate) registry: Arc<Registry<M::Node>>,
    pub(crate) root: Latest<Option<ViewNode<M::Node>>>,
    pub(crate) root_state: Mutex<RootState<M::Node>>,
    pub(crate) listener: Mutex<Option<Weak<dyn ModelListener<M::Node>>>>,
    pub(crate) in_flight: Arc<watch::Sender<usize>>,
}

/// Counts one running model task.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn new(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl<M: DomainModel> Shared<M> {
    pub(crate) fn listener(&self) -> Option<Arc<dyn ModelListener<M::Node>>> {
        self.listener.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Spawn a model task bound to `scope` and counted by `wait_idle`.
    pub(crate) fn spawn_task<F>(&self, scope: &Scope, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = InFlight::new(&self.in_flight);
        self.executors.background.spawn_scoped(scope, async move {
            let _guard = guard;
            fut.await;
        });
    }

    /// Registered node for `domain` under `parent`, created if missing.
    /// A fresh node starts its first presentation production.
    pub(crate) fn create_node(
        &self,
        parent: Option<&ViewNode<M::Node>>,
        domain: M::Node,
    ) -> ViewNode<M::Node> {
        let parent_scope = parent.map_or(&self.scope, ViewNode::scope);
        let loader: Weak<dyn NodeLoader<M::Node>> = self.this.clone();
        let (node, created) =
            self.registry
                .get_or_create(parent.map(ViewNode::id), domain, |domain| {
                    ViewNode::new(domain, parent, parent_scope, loader)
                });
        if created {
            self.start_first_production(&node);
        }
        node
    }
}

impl<M: DomainModel> NodeLoader<M::Node> for Shared<M> {
    fn ensure_children_loading(&self, node: &ViewNode<M::Node>) {
        if !node.children_requested() {
            self.load_children(node);
        }
    }
}

impl<M: DomainModel> Drop for Shared<M> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// Identity-stable, lazily loaded view over a domain model.
pub struct TreeViewModel<M: DomainModel> {
    pub(crate) shared: Arc<Shared<M>>,
}

impl<M: DomainModel> Clone for TreeViewModel<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: DomainModel> TreeViewModel<M> {
    #[must_use]
    pub fn new(domain: Arc<M>, executors: Executors, config: TreeModelConfig) -> Self {
        let (in_flight, _) = watch::channel(0usize);
        let shared = Arc::new_cyclic(|this| Shared {
            this: this.clone(),
            domain,
            executors,
            config,
            scope: Scope::root("tree-view-model"),
            registry: Registry::new(),
            root: Latest::new(),
            root_state: Mutex::new(RootState {
                generation: 0,
                requested: false,
                current: None,
                load: None,
            }),
            listener: Mutex::new(None),
            in_flight: Arc::new(in_flight),
        });
        Self { shared }
    }

    #[must_use]
    pub fn domain(&self) -> &Arc<M> {
        &self.shared.domain
    }

    #[must_use]
    pub fn executors(&self) -> &Executors {
        &self.shared.executors
    }

    #[must_use]
    pub fn config(&self) -> &TreeModelConfig {
        &self.shared.config
    }

    /// Top-level scope; every node scope nests under it.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.shared.scope
    }

    /// Install the change listener. Held weakly.
    pub fn set_listener(&self, listener: Weak<dyn ModelListener<M::Node>>) {
        *self.shared.listener.lock() = Some(listener);
    }

    pub fn clear_listener(&self) {
        *self.shared.listener.lock() = None;
    }

    /// Root as currently known, without waiting.
    #[must_use]
    pub fn root_now(&self) -> Option<ViewNode<M::Node>> {
        if self.is_disposed() {
            return None;
        }
        self.shared.root.current().flatten()
    }

    /// Compute the root if needed and wait for it. `None` for an empty tree
    /// or a disposed model.
    pub async fn root(&self) -> Option<ViewNode<M::Node>> {
        if self.is_disposed() {
            return None;
        }
        self.request_root();
        self.shared.root.ready().await.flatten()
    }

    /// Start computing the root unless already requested.
    pub fn request_root(&self) {
        let requested = self.shared.root_state.lock().requested;
        if !requested {
            self.shared.load_root(false);
        }
    }

    /// Recompute the root. With `recursive`, a kept root is invalidated
    /// recursively; otherwise only its presentation and children refresh.
    pub fn invalidate_root(&self, recursive: bool) {
        self.shared.load_root(recursive);
    }

    /// Recompute `node`'s presentation and, if they were ever requested, its
    /// children. With `recursive`, loaded descendants are invalidated first.
    pub fn invalidate(&self, node: &ViewNode<M::Node>, recursive: bool) {
        if node.is_disposed() {
            consistency_violation("use of a disposed node");
            return;
        }
        self.shared.invalidate(node, recursive);
    }

    /// Make sure `node`'s children are loading or loaded. If they are
    /// already loaded, the listener receives them again as an initial
    /// change set.
    pub fn ensure_children(&self, node: &ViewNode<M::Node>) {
        if node.is_disposed() {
            consistency_violation("use of a disposed node");
            return;
        }
        self.shared.ensure_children(node);
    }

    /// Request a presentation refresh for `node`.
    pub fn refresh_presentation(&self, node: &ViewNode<M::Node>) {
        if node.is_disposed() {
            consistency_violation("use of a disposed node");
            return;
        }
        self.shared.request_presentation(node);
    }

    /// Resolve when no model task is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Number of running model tasks.
    #[must_use]
    pub fn tasks_in_flight(&self) -> usize {
        *self.shared.in_flight.borrow()
    }

    /// Whether a live node with `id` is registered.
    #[must_use]
    pub fn is_registered(&self, id: NodeId) -> bool {
        self.shared.registry.contains_id(id)
    }

    /// Number of live registered nodes.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Walk the loaded view model for the first node whose domain node
    /// matches `predicate`, loading children along the way.
    pub async fn find(
        &self,
        predicate: impl Fn(&M::Node) -> bool + Send + Sync + 'static,
        scope: &Scope,
    ) -> WalkOutcome<ViewNode<M::Node>> {
        let source = ViewModelWalkSource::new(self.clone());
        let visitor = find(move |node: &ViewNode<M::Node>| predicate(node.domain()));
        walk(&source, Arc::new(visitor), &self.shared.executors, scope).await
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.scope.is_cancelled()
    }

    /// Dispose every node and stop all loading.
    pub fn dispose(&self) {
        tracing::debug!("disposing tree view model");
        self.shared.scope.cancel();
        self.shared.root.close();
        self.shared.root_state.lock().current = None;
    }
}

impl<M: DomainModel> std::fmt::Debug for TreeViewModel<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeViewModel")
            .field("registered", &self.registered_count())
            .field("in_flight", &self.tasks_in_flight())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDomain;
    use arbor_core::{Background, Foreground};

    fn model(domain: MemoryDomain) -> TreeViewModel<MemoryDomain> {
        let executors = Executors::new(
            Foreground::new("model-unit").unwrap(),
            Background::current(1).unwrap(),
        );
        TreeViewModel::new(Arc::new(domain), executors, TreeModelConfig::default())
    }

    #[test]
    fn in_flight_guard_counts() {
        let (tx, _) = watch::channel(0usize);
        let tx = Arc::new(tx);
        let a = InFlight::new(&tx);
        let b = InFlight::new(&tx);
        assert_eq!(*tx.borrow(), 2);
        drop(a);
        drop(b);
        assert_eq!(*tx.borrow(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn idle_model_has_no_tasks() {
        let model = model(MemoryDomain::from_edges("r", &[]));
        model.wait_idle().await;
        assert_eq!(model.tasks_in_flight(), 0);
        assert!(model.root_now().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispose_is_idempotent() {
        let model = model(MemoryDomain::from_edges("r", &[]));
        let root = model.root().await.unwrap();
        model.dispose();
        model.dispose();
        assert!(root.is_disposed());
        assert!(model.root_now().is_none());
        model.invalidate_root(true);
        assert_eq!(model.tasks_in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_listener_is_ignored() {
        struct Silent;
        impl ModelListener<String> for Silent {
            fn root_changed(&self, _: Option<ViewNode<String>>, _: Option<ViewNode<String>>) {}
            fn children_changed(&self, _: &ViewNode<String>, _: ChangeSet<ViewNode<String>>) {}
        }
        let model = model(MemoryDomain::from_edges("r", &[("r", &["a"])]));
        let listener: Arc<dyn ModelListener<String>> = Arc::new(Silent);
        model.set_listener(Arc::downgrade(&listener));
        drop(listener);
        let root = model.root().await.unwrap();
        assert_eq!(root.current_children().await.map(|c| c.len()), Some(1));
    }
}
