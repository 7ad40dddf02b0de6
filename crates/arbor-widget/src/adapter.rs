#![forbid(unsafe_code)]

//! Synchronous widget adapter over the asynchronous view model.
//!
//! [`TreeAdapter`] answers the widget contract (`root`, `child`,
//! `child_count`, `is_leaf`, `index_of_child`) from a mirror of published
//! state and never waits. Model changes reach it through a bridge listener
//! that only enqueues work on the foreground executor; there the mirror is
//! updated and widget listeners are notified.
//!
//! # Event protocol
//!
//! ```text
//! model task ──► bridge ──dispatch──► foreground: update mirror ──► listeners ──► mark Published
//! ```
//!
//! Per children reload of one parent the adapter emits, in order:
//!
//! 1. `nodes_removed` (old indices, ascending)
//! 2. `nodes_inserted` (new indices, ascending)
//! 3. `nodes_changed` (kept nodes that did not move)
//!
//! The first delivery of a parent's children, a mismatch between the
//! mirror and the model's previous list, and a new root each produce one
//! `structure_changed` instead. Empty batches are not emitted.
//!
//! A node becomes `Published` only after the event introducing it has been
//! delivered to every listener; `accept`, `select` and `scroll_to` wait for
//! that.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Foreground executor gone | Model event dropped, logged at `warn` |
//! | Event for a parent not mirrored | Ignored |
//! | Superseded selection or scroll | Dropped, the call returns `false` |

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use arbor_core::{
    DomainModel, DomainNode, Executors, NodeId, Presentation, Scope, TreeModelConfig, TreePath,
};
use arbor_model::{ChangeSet, ModelListener, SnapshotSource, TreeViewModel, ViewNode};
use futures::future::join_all;
use parking_lot::Mutex;

use crate::event::{TreeModelEvent, TreeModelListener, WidgetPath};
use crate::node::{CachedNode, PlaceholderNode, WidgetNode};
use crate::state::Mirror;

// ============================================================================
// Latest-wins requests
// ============================================================================

/// Slot for a latest-wins request (selection or scroll).
#[derive(Debug, Default)]
struct Request {
    generation: u64,
    scope: Option<Scope>,
}

impl Request {
    /// Supersede the previous request and open a scope for the new one.
    fn begin(&mut self, parent: &Scope, name: &str) -> (u64, Scope) {
        if let Some(previous) = self.scope.take() {
            previous.cancel();
        }
        self.generation += 1;
        let scope = parent.child(name);
        self.scope = Some(scope.clone());
        (self.generation, scope)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct AdapterShared<M: DomainModel> {
    pub(crate) model: TreeViewModel<M>,
    executors: Executors,
    config: TreeModelConfig,
    scope: Scope,
    pub(crate) mirror: Mutex<Mirror<M::Node>>,
    listeners: Mutex<Vec<Arc<dyn TreeModelListener<M::Node>>>>,
    loading_allowed: AtomicBool,
    pending_presentations: Mutex<HashSet<NodeId>>,
    selection: Mutex<Vec<WidgetPath<M::Node>>>,
    selection_request: Mutex<Request>,
    scroll_request: Mutex<Request>,
    bridge: Arc<ModelBridge<M>>,
}

impl<M: DomainModel> Drop for AdapterShared<M> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

fn dispose_cached<N: DomainNode>(nodes: &[WidgetNode<N>]) {
    for node in nodes {
        if let WidgetNode::Cached(cached) = node {
            cached.dispose();
        }
    }
}

impl<M: DomainModel> AdapterShared<M> {
    /// Deliver to every listener, outside the mirror lock.
    fn emit(&self, f: impl Fn(&dyn TreeModelListener<M::Node>)) {
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }

    // ── Seeding ─────────────────────────────────────────────────────────

    /// Fill the mirror with cached nodes from `source`.
    fn seed(&self, source: &dyn SnapshotSource) {
        let Some(root_key) = source.root() else {
            return;
        };
        let mut mirror = self.mirror.lock();
        let root = cached_node(source, &root_key);
        mirror.set_root(Some(WidgetNode::Cached(root.clone())));

        let mut seen = HashSet::from([root_key]);
        let mut stack = vec![root];
        while let Some(parent) = stack.pop() {
            if parent.is_leaf() {
                continue;
            }
            let mut children = Vec::new();
            for key in source.children(parent.key()) {
                if !seen.insert(key.clone()) {
                    tracing::debug!(key = %key, "snapshot key repeated, skipping");
                    continue;
                }
                let child = cached_node(source, &key);
                children.push(WidgetNode::Cached(child.clone()));
                stack.push(child);
            }
            mirror.set_children(parent.id(), children);
        }
        tracing::debug!(nodes = mirror.len(), "seeded adapter from snapshot");
    }

    // ── Foreground: model events ────────────────────────────────────────

    fn apply_root(&self, new: Option<ViewNode<M::Node>>) {
        if new.as_ref().is_some_and(ViewNode::is_disposed) {
            return;
        }
        let replaced = {
            let mut mirror = self.mirror.lock();
            let current = mirror.root().map(WidgetNode::id);
            if current == new.as_ref().map(ViewNode::id) {
                false
            } else {
                let dropped = mirror.set_root(new.clone().map(WidgetNode::Live));
                dispose_cached(&dropped);
                true
            }
        };
        if replaced {
            tracing::debug!(
                root_id = new.as_ref().map(|n| n.id().get()),
                "root published"
            );
            self.emit(|l| l.structure_changed(None));
        }
        if let Some(root) = &new {
            root.mark_published();
        }
    }

    fn apply_children(&self, parent: ViewNode<M::Node>, changes: ChangeSet<ViewNode<M::Node>>) {
        if parent.is_disposed() {
            return;
        }
        let parent_id = parent.id();

        let wholesale = {
            let mut mirror = self.mirror.lock();
            if !mirror.contains(parent_id) {
                tracing::trace!(parent_id = parent_id.get(), "children for unmirrored parent ignored");
                return;
            }
            let previous: Vec<NodeId> = changes.previous.iter().map(ViewNode::id).collect();
            let mismatch = mirror.child_ids(parent_id).as_deref() != Some(previous.as_slice());
            if changes.initial || mismatch {
                let children = changes.children.iter().cloned().map(WidgetNode::Live).collect();
                let dropped = mirror.set_children(parent_id, children);
                dispose_cached(&dropped);
                Some(mirror.path_of(parent_id))
            } else {
                None
            }
        };

        if let Some(path) = wholesale {
            tracing::debug!(
                parent_id = parent_id.get(),
                children = changes.children.len(),
                "children published"
            );
            self.emit(|l| l.structure_changed(path.as_ref()));
            for child in &changes.children {
                child.mark_published();
            }
            return;
        }

        let events = changes.events();

        if !events.removed.is_empty() {
            let path = {
                let mut mirror = self.mirror.lock();
                for removal in events.removed.iter().rev() {
                    mirror.remove_child_at(parent_id, removal.index);
                }
                let gone: Vec<NodeId> = changes.removed.iter().map(|r| r.node.id()).collect();
                dispose_cached(&mirror.prune(&gone));
                mirror.path_of(parent_id)
            };
            if let Some(path) = path {
                let event = TreeModelEvent {
                    path,
                    indices: events.removed.iter().map(|r| r.index).collect(),
                    nodes: events.removed.iter().map(|r| r.node.clone().into()).collect(),
                };
                self.emit(|l| l.nodes_removed(&event));
            }
        }

        if !events.inserted.is_empty() {
            let path = {
                let mut mirror = self.mirror.lock();
                for insertion in &events.inserted {
                    mirror.insert_child_at(parent_id, insertion.index, insertion.node.clone().into());
                }
                mirror.path_of(parent_id)
            };
            if let Some(path) = path {
                let event = TreeModelEvent {
                    path,
                    indices: events.inserted.iter().map(|i| i.index).collect(),
                    nodes: events.inserted.iter().map(|i| i.node.clone().into()).collect(),
                };
                self.emit(|l| l.nodes_inserted(&event));
            }
            for insertion in &changes.inserted {
                insertion.node.mark_published();
            }
        }

        if !events.changed.is_empty() {
            let path = self.mirror.lock().path_of(parent_id);
            if let Some(path) = path {
                let event = TreeModelEvent {
                    path,
                    indices: events.changed.iter().map(|c| c.index).collect(),
                    nodes: events.changed.iter().map(|c| c.node.clone().into()).collect(),
                };
                self.emit(|l| l.nodes_changed(&event));
            }
        }

        tracing::debug!(
            parent_id = parent_id.get(),
            removed = events.removed.len(),
            inserted = events.inserted.len(),
            changed = events.changed.len(),
            "children reconciled"
        );
    }

    fn apply_presentation(&self, node: ViewNode<M::Node>) {
        self.pending_presentations.lock().remove(&node.id());
        if node.is_disposed() {
            return;
        }
        let event = presentation_event(&self.mirror.lock(), node.id());
        if let Some(event) = event {
            tracing::trace!(node_id = node.id().get(), "presentation published");
            self.emit(|l| l.nodes_changed(&event));
        }
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Run `f` over `parent`'s mirrored children, starting a load when the
    /// gate allows it.
    fn read_children<R>(
        &self,
        parent: &WidgetNode<M::Node>,
        f: impl FnOnce(&[WidgetNode<M::Node>]) -> R,
    ) -> R {
        let mut start = None;
        let result = {
            let mut mirror = self.mirror.lock();
            let Some(entry) = mirror.entry_mut(parent.id()) else {
                return f(&[]);
            };
            if entry.children.is_none() && !entry.loading && self.loading_allowed() {
                if let WidgetNode::Live(view) = &entry.node {
                    if !view.is_disposed() && !entry.node.is_leaf() {
                        entry.loading = true;
                        if self.config.loading_placeholder {
                            let placeholder =
                                PlaceholderNode::new(view.id(), &self.config.placeholder_text);
                            entry.children = Some(vec![WidgetNode::Placeholder(placeholder)]);
                        }
                        start = Some(view.clone());
                    }
                }
            }
            f(entry.children.as_deref().unwrap_or(&[]))
        };
        if let Some(view) = start.filter(|v| !v.is_disposed()) {
            tracing::trace!(node_id = view.id().get(), "children requested by read");
            self.model.ensure_children(&view);
        }
        result
    }

    fn loading_allowed(&self) -> bool {
        self.loading_allowed.load(Ordering::Acquire)
    }
}

fn cached_node(source: &dyn SnapshotSource, key: &str) -> CachedNode {
    let leaf = source.is_leaf(key);
    let presentation = source
        .presentation(key)
        .unwrap_or_else(|| Presentation::text(key))
        .with_leaf(leaf);
    CachedNode::new(key, presentation, leaf)
}

/// `nodes_changed` event for one node; a root change carries no indices.
fn presentation_event<N: DomainNode>(mirror: &Mirror<N>, id: NodeId) -> Option<TreeModelEvent<N>> {
    let entry = mirror.entry(id)?;
    match entry.parent {
        Some(parent) => Some(TreeModelEvent {
            path: mirror.path_of(parent)?,
            indices: vec![mirror.index_of(parent, id)?],
            nodes: vec![entry.node.clone()],
        }),
        None => Some(TreeModelEvent {
            path: mirror.path_of(id)?,
            indices: Vec::new(),
            nodes: Vec::new(),
        }),
    }
}

// ============================================================================
// Model bridge
// ============================================================================

/// View model listener that forwards changes to the foreground.
struct ModelBridge<M: DomainModel> {
    adapter: Weak<AdapterShared<M>>,
}

impl<M: DomainModel> ModelBridge<M> {
    fn dispatch(&self, what: &'static str, job: impl FnOnce(&AdapterShared<M>) + Send + 'static) {
        let Some(adapter) = self.adapter.upgrade() else {
            return;
        };
        if adapter.scope.is_cancelled() {
            return;
        }
        let weak = self.adapter.clone();
        let result = adapter.executors.foreground.dispatch(move || {
            if let Some(adapter) = weak.upgrade() {
                if !adapter.scope.is_cancelled() {
                    job(&adapter);
                }
            }
        });
        if let Err(err) = result {
            tracing::warn!(event = what, error = %err, "foreground unavailable, model event dropped");
        }
    }
}

impl<M: DomainModel> ModelListener<M::Node> for ModelBridge<M> {
    fn root_changed(&self, _old: Option<ViewNode<M::Node>>, new: Option<ViewNode<M::Node>>) {
        self.dispatch("root_changed", move |adapter| adapter.apply_root(new));
    }

    fn children_changed(&self, parent: &ViewNode<M::Node>, changes: ChangeSet<ViewNode<M::Node>>) {
        let parent = parent.clone();
        self.dispatch("children_changed", move |adapter| {
            adapter.apply_children(parent, changes);
        });
    }

    fn presentation_changed(&self, node: &ViewNode<M::Node>) {
        let Some(adapter) = self.adapter.upgrade() else {
            return;
        };
        // Coalesced: one pending delivery per node reads the latest value.
        if !adapter.pending_presentations.lock().insert(node.id()) {
            return;
        }
        let node = node.clone();
        self.dispatch("presentation_changed", move |adapter| {
            adapter.apply_presentation(node);
        });
    }
}

// ============================================================================
// TreeAdapter
// ============================================================================

/// Widget-facing view of a [`TreeViewModel`].
pub struct TreeAdapter<M: DomainModel> {
    pub(crate) shared: Arc<AdapterShared<M>>,
}

impl<M: DomainModel> Clone for TreeAdapter<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: DomainModel> TreeAdapter<M> {
    /// Attach to `model` and request its root.
    #[must_use]
    pub fn new(model: TreeViewModel<M>) -> Self {
        Self::build(model, None)
    }

    /// Attach to `model`, showing the tree of `snapshot` until the live
    /// root arrives.
    #[must_use]
    pub fn with_snapshot(model: TreeViewModel<M>, snapshot: &dyn SnapshotSource) -> Self {
        Self::build(model, Some(snapshot))
    }

    fn build(model: TreeViewModel<M>, snapshot: Option<&dyn SnapshotSource>) -> Self {
        let executors = model.executors().clone();
        let config = model.config().clone();
        let scope = model.scope().child("tree-adapter");
        let loading_allowed = AtomicBool::new(config.load_on_read);
        let shared = Arc::new_cyclic(|weak: &Weak<AdapterShared<M>>| AdapterShared {
            model: model.clone(),
            executors,
            config,
            scope,
            mirror: Mutex::new(Mirror::new()),
            listeners: Mutex::new(Vec::new()),
            loading_allowed,
            pending_presentations: Mutex::new(HashSet::new()),
            selection: Mutex::new(Vec::new()),
            selection_request: Mutex::new(Request::default()),
            scroll_request: Mutex::new(Request::default()),
            bridge: Arc::new(ModelBridge {
                adapter: weak.clone(),
            }),
        });

        if let Some(snapshot) = snapshot {
            shared.seed(snapshot);
        }

        let bridge: Arc<dyn ModelListener<M::Node>> = shared.bridge.clone();
        model.set_listener(Arc::downgrade(&bridge));
        // A root computed before the bridge was installed is never announced.
        if let Some(root) = model.root_now() {
            let replay = root.clone();
            shared
                .bridge
                .dispatch("root_changed", move |adapter| adapter.apply_root(Some(root)));
            // Lists loaded before the bridge was installed come back as
            // initial change sets, parents ahead of their children.
            let mut stack = vec![replay];
            while let Some(node) = stack.pop() {
                if node.is_disposed() || !node.children_loaded() {
                    continue;
                }
                model.ensure_children(&node);
                stack.extend(node.children_now().unwrap_or_default());
            }
        }
        model.request_root();

        Self { shared }
    }

    #[must_use]
    pub fn model(&self) -> &TreeViewModel<M> {
        &self.shared.model
    }

    #[must_use]
    pub fn executors(&self) -> &Executors {
        &self.shared.executors
    }

    #[must_use]
    pub fn config(&self) -> &TreeModelConfig {
        &self.shared.config
    }

    /// Adapter scope, nested under the model's.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.shared.scope
    }

    // ── Widget contract ─────────────────────────────────────────────────

    #[must_use]
    pub fn root(&self) -> Option<WidgetNode<M::Node>> {
        self.shared.mirror.lock().root().cloned()
    }

    /// Number of children shown under `parent`.
    ///
    /// Reading an unloaded node starts loading its children when loading
    /// is allowed; meanwhile a placeholder child may be shown.
    #[must_use]
    pub fn child_count(&self, parent: &WidgetNode<M::Node>) -> usize {
        self.shared.read_children(parent, <[_]>::len)
    }

    #[must_use]
    pub fn child(&self, parent: &WidgetNode<M::Node>, index: usize) -> Option<WidgetNode<M::Node>> {
        self.shared
            .read_children(parent, |children| children.get(index).cloned())
    }

    #[must_use]
    pub fn is_leaf(&self, node: &WidgetNode<M::Node>) -> bool {
        node.is_leaf()
    }

    #[must_use]
    pub fn index_of_child(
        &self,
        parent: &WidgetNode<M::Node>,
        child: &WidgetNode<M::Node>,
    ) -> Option<usize> {
        self.shared.mirror.lock().index_of(parent.id(), child.id())
    }

    /// Path from the root to `node`, if shown.
    #[must_use]
    pub fn path_of(&self, node: &WidgetNode<M::Node>) -> Option<WidgetPath<M::Node>> {
        self.shared.mirror.lock().path_of(node.id())
    }

    pub fn add_listener(&self, listener: Arc<dyn TreeModelListener<M::Node>>) {
        self.shared.listeners.lock().push(listener);
    }

    /// Remove a listener added earlier. Returns whether it was found.
    pub fn remove_listener(&self, listener: &Arc<dyn TreeModelListener<M::Node>>) -> bool {
        let mut listeners = self.shared.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Allow or forbid reads to start children loads.
    pub fn set_loading_allowed(&self, allowed: bool) {
        self.shared.loading_allowed.store(allowed, Ordering::Release);
    }

    #[must_use]
    pub fn loading_allowed(&self) -> bool {
        self.shared.loading_allowed()
    }

    /// Number of nodes in the mirror.
    #[must_use]
    pub fn shown_count(&self) -> usize {
        self.shared.mirror.lock().len()
    }

    /// Whether `id` is in the mirror.
    #[must_use]
    pub fn is_shown(&self, id: NodeId) -> bool {
        self.shared.mirror.lock().contains(id)
    }

    // ── Publication ─────────────────────────────────────────────────────

    /// Wait until `node` is published. `false` if it was disposed or
    /// `scope` was cancelled first.
    pub async fn await_published(&self, node: &ViewNode<M::Node>, scope: &Scope) -> bool {
        scope.run(node.wait_published()).await.unwrap_or(false)
    }

    /// Select `paths` once their nodes are published.
    ///
    /// Latest wins: returns `false` if a newer selection superseded this one
    /// or a node was disposed before delivery.
    pub async fn select(&self, paths: Vec<TreePath<ViewNode<M::Node>>>) -> bool {
        let shared = &self.shared;
        let (generation, scope) = shared
            .selection_request
            .lock()
            .begin(&shared.scope, "select");

        let published = scope
            .run(join_all(paths.iter().map(|p| p.last().wait_published())))
            .await;
        if !published.is_some_and(|all| all.iter().all(|ok| *ok)) {
            scope.cancel();
            return false;
        }

        let adapter = Arc::clone(shared);
        let delivered = shared
            .executors
            .foreground
            .run(move || {
                if !adapter.selection_request.lock().is_current(generation)
                    || paths.iter().any(|p| p.last().is_disposed())
                {
                    return false;
                }
                let widget_paths: Vec<WidgetPath<M::Node>> = paths
                    .iter()
                    .map(|p| p.map(|n| WidgetNode::Live(n.clone())))
                    .collect();
                *adapter.selection.lock() = widget_paths.clone();
                adapter.emit(|l| l.selection_changed(&widget_paths));
                true
            })
            .await;
        scope.cancel();
        matches!(delivered, Ok(true))
    }

    /// Paths of the last delivered selection.
    #[must_use]
    pub fn selection(&self) -> Vec<WidgetPath<M::Node>> {
        self.shared.selection.lock().clone()
    }

    /// Ask the widget to scroll to `path` once its node is published.
    /// Latest wins, like [`select`](Self::select).
    pub async fn scroll_to(&self, path: TreePath<ViewNode<M::Node>>) -> bool {
        let shared = &self.shared;
        let (generation, scope) = shared
            .scroll_request
            .lock()
            .begin(&shared.scope, "scroll");

        if !scope.run(path.last().wait_published()).await.unwrap_or(false) {
            scope.cancel();
            return false;
        }

        let adapter = Arc::clone(shared);
        let delivered = shared
            .executors
            .foreground
            .run(move || {
                if !adapter.scroll_request.lock().is_current(generation) || path.last().is_disposed() {
                    return false;
                }
                let widget_path = path.map(|n| WidgetNode::Live(n.clone()));
                adapter.emit(|l| l.scroll_requested(&widget_path));
                true
            })
            .await;
        scope.cancel();
        matches!(delivered, Ok(true))
    }

    /// Resolve once the model is idle and every resulting event has been
    /// delivered.
    pub async fn settle(&self) {
        let shared = &self.shared;
        loop {
            shared.model.wait_idle().await;
            if shared.executors.foreground.flush().await.is_err() {
                return;
            }
            if shared.model.tasks_in_flight() == 0 {
                // Tasks finishing during the first flush may have queued more.
                if shared.executors.foreground.flush().await.is_err() {
                    return;
                }
                if shared.model.tasks_in_flight() == 0 {
                    return;
                }
            }
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.scope.is_cancelled()
    }

    /// Detach from the model, dispose it and forget every node.
    pub fn dispose(&self) {
        tracing::debug!("disposing tree adapter");
        let shared = &self.shared;
        shared.scope.cancel();
        shared.model.clear_listener();
        shared.model.dispose();
        let dropped = shared.mirror.lock().clear();
        dispose_cached(&dropped);
        shared.listeners.lock().clear();
        shared.selection.lock().clear();
    }
}

impl<M: DomainModel> std::fmt::Debug for TreeAdapter<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeAdapter")
            .field("shown", &self.shown_count())
            .field("loading_allowed", &self.loading_allowed())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_supersedes_previous() {
        let parent = Scope::root("adapter");
        let mut request = Request::default();
        let (first, first_scope) = request.begin(&parent, "select");
        let (second, second_scope) = request.begin(&parent, "select");
        assert!(first_scope.is_cancelled());
        assert!(!second_scope.is_cancelled());
        assert!(!request.is_current(first));
        assert!(request.is_current(second));
    }

    #[test]
    fn root_presentation_event_has_no_indices() {
        let mut mirror: Mirror<u32> = Mirror::new();
        let root = WidgetNode::Cached(CachedNode::new("r", Presentation::text("r"), false));
        let child = WidgetNode::Cached(CachedNode::new("c", Presentation::text("c"), true));
        mirror.set_root(Some(root.clone()));
        mirror.set_children(root.id(), vec![child.clone()]);

        let event = presentation_event(&mirror, root.id()).unwrap();
        assert!(event.is_empty());
        assert_eq!(event.parent(), &root);

        let event = presentation_event(&mirror, child.id()).unwrap();
        assert_eq!(event.indices, vec![0]);
        assert_eq!(event.nodes, vec![child]);
        assert!(presentation_event(&mirror, NodeId::next()).is_none());
    }
}
