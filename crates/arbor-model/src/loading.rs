#![forbid(unsafe_code)]

//! Root, children and presentation loading for [`TreeViewModel`].
//!
//! Every load follows the same shape:
//!
//! 1. Under the owner's lock: bump the generation, cancel the previous load
//!    scope, open a fresh child scope.
//! 2. On a background task: run the domain call while holding a permit,
//!    then build or reuse view nodes and wait for them to load.
//! 3. Under the owner's lock again: drop the result if a newer generation
//!    started, otherwise commit it and notify the listener.
//!
//! Permits are held only around domain calls, never while waiting on other
//! nodes, so nested loads cannot starve each other.
//!
//! [`TreeViewModel`]: crate::TreeViewModel

use std::collections::HashSet;
use std::sync::Arc;

use arbor_core::{
    DomainError, DomainModel, NodeId, NodeLifecycle, Presentation, Scope, consistency_violation,
};
use futures::StreamExt;
use futures::future::join_all;

use crate::diff::{ChangeSet, reconcile};
use crate::model::Shared;
use crate::view_node::ViewNode;

impl<M: DomainModel> Shared<M> {
    // ─────────────────────────────────────────────────────────────────────
    // Root
    // ─────────────────────────────────────────────────────────────────────

    pub(crate) fn load_root(&self, recursive: bool) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        if self.scope.is_cancelled() {
            return;
        }
        let (generation, scope) = {
            let mut state = self.root_state.lock();
            state.generation += 1;
            state.requested = true;
            if let Some(previous) = state.load.take() {
                previous.cancel();
            }
            let scope = self.scope.child("root-load");
            state.load = Some(scope.clone());
            (state.generation, scope)
        };
        tracing::debug!(generation, recursive, "root load requested");
        let task_scope = scope.clone();
        self.spawn_task(&scope, async move {
            this.run_root_load(generation, recursive, &task_scope).await;
            task_scope.cancel();
        });
    }

    async fn run_root_load(&self, generation: u64, recursive: bool, scope: &Scope) {
        let Some(result) = self.executors.background.run(scope, self.domain.root()).await else {
            return;
        };
        let domain_root = result.unwrap_or_else(|err| {
            tracing::warn!(generation, error = %err, "root computation failed");
            None
        });

        let current = self.root_state.lock().current.clone();
        if let (Some(current), Some(domain_root)) = (&current, &domain_root) {
            if current.domain() == domain_root && !current.is_disposed() {
                tracing::debug!(node_id = current.id().get(), generation, "root kept");
                self.invalidate(current, recursive);
                let state = self.root_state.lock();
                if state.generation == generation {
                    self.root.publish_ready(generation, Some(current.clone()));
                }
                return;
            }
        }

        let new_root = match domain_root {
            Some(domain) => {
                let node = self.create_node(None, domain);
                match scope.run(node.wait_loaded()).await {
                    None => return,
                    Some(true) => Some(node),
                    Some(false) => None,
                }
            }
            None => None,
        };

        let mut state = self.root_state.lock();
        if state.generation != generation || self.scope.is_cancelled() {
            return;
        }
        let old = std::mem::replace(&mut state.current, new_root.clone());
        let changed = old != new_root;
        if changed {
            if let Some(old) = &old {
                old.dispose();
            }
        }
        for orphan in self.registry.children_of(None) {
            if Some(&orphan) != new_root.as_ref() {
                orphan.dispose();
            }
        }
        tracing::debug!(
            generation,
            root = ?new_root.as_ref().map(|n| n.id().get()),
            changed,
            "root committed"
        );
        // Announced before readers can see it, so the listener hears of the
        // root before any change to its children.
        if changed {
            if let Some(listener) = self.listener() {
                listener.root_changed(old, new_root.clone());
            }
        }
        self.root.publish_ready(generation, new_root);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Presentation
    // ─────────────────────────────────────────────────────────────────────

    /// Start the atomic first production of a freshly created node.
    pub(crate) fn start_first_production(&self, node: &ViewNode<M::Node>) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let generation = {
            let mut load = node.inner.load.lock();
            if load.first_running || load.first_done {
                return;
            }
            load.first_running = true;
            load.presentation_generation += 1;
            load.presentation_generation
        };
        let node = node.clone();
        let scope = node.scope().clone();
        self.spawn_task(&scope, async move {
            this.run_first_production(&node, generation).await;
        });
    }

    async fn run_first_production(&self, node: &ViewNode<M::Node>, generation: u64) {
        let produced = self
            .executors
            .background
            .run(node.scope(), self.produce_all(node, generation))
            .await;
        match produced {
            None => return,
            Some(Ok(())) => {}
            Some(Err(err)) => {
                tracing::warn!(node_id = node.id().get(), error = %err, "presentation failed, dropping node");
                node.dispose();
                return;
            }
        }
        node.inner.presentation.mark_ready();
        node.advance(NodeLifecycle::Loaded);
        let pending = {
            let mut load = node.inner.load.lock();
            load.first_running = false;
            load.first_done = true;
            std::mem::take(&mut load.refresh_pending)
        };
        tracing::trace!(node_id = node.id().get(), generation, pending, "node loaded");
        if pending {
            self.request_presentation(node);
        }
    }

    /// Publish every snapshot of the node's presentation stream.
    async fn produce_all(&self, node: &ViewNode<M::Node>, generation: u64) -> Result<(), DomainError> {
        let leaf = self.domain.is_leaf(node.domain()).await?;
        let mut stream = self.domain.presentation(node.domain());
        let mut produced = false;
        while let Some(item) = stream.next().await {
            node.inner.presentation.publish(generation, item?.with_leaf(leaf));
            produced = true;
        }
        if !produced {
            node.inner
                .presentation
                .publish(generation, Presentation::default().with_leaf(leaf));
        }
        Ok(())
    }

    /// Drain the node's presentation stream and return its final snapshot.
    async fn produce_last(&self, node: &ViewNode<M::Node>) -> Result<Presentation, DomainError> {
        let leaf = self.domain.is_leaf(node.domain()).await?;
        let mut stream = self.domain.presentation(node.domain());
        let mut last = None;
        while let Some(item) = stream.next().await {
            last = Some(item?);
        }
        Ok(last.unwrap_or_default().with_leaf(leaf))
    }

    /// Request a latest-wins presentation refresh.
    pub(crate) fn request_presentation(&self, node: &ViewNode<M::Node>) {
        if node.is_disposed() {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let (generation, scope) = {
            let mut load = node.inner.load.lock();
            if load.first_running {
                load.refresh_pending = true;
                return;
            }
            if !load.first_done {
                return;
            }
            if let Some(previous) = load.production.take() {
                previous.cancel();
            }
            load.presentation_generation += 1;
            let scope = node.scope().child("presentation");
            load.production = Some(scope.clone());
            (load.presentation_generation, scope)
        };
        let node = node.clone();
        let task_scope = scope.clone();
        self.spawn_task(&scope, async move {
            this.run_refresh(&node, generation, &task_scope).await;
            task_scope.cancel();
        });
    }

    async fn run_refresh(&self, node: &ViewNode<M::Node>, generation: u64, scope: &Scope) {
        let produced = self.executors.background.run(scope, self.produce_last(node)).await;
        if let Some(result) = produced {
            match result {
                Ok(presentation) => {
                    let accepted = node.inner.presentation.publish(generation, presentation);
                    if accepted && node.lifecycle() == NodeLifecycle::Published {
                        if let Some(listener) = self.listener() {
                            listener.presentation_changed(node);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        node_id = node.id().get(),
                        generation,
                        error = %err,
                        "presentation refresh failed, keeping previous"
                    );
                }
            }
        }
        let mut load = node.inner.load.lock();
        if load.production.as_ref().is_some_and(|s| s.ptr_eq(scope)) {
            load.production = None;
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Children
    // ─────────────────────────────────────────────────────────────────────

    /// Start a latest-wins children load for `parent`.
    pub(crate) fn load_children(&self, parent: &ViewNode<M::Node>) {
        if parent.is_disposed() {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let (generation, scope) = {
            let mut load = parent.inner.load.lock();
            load.children_requested = true;
            if let Some(previous) = load.children_load.take() {
                previous.cancel();
            }
            load.children_generation += 1;
            let scope = parent.scope().child("children");
            load.children_load = Some(scope.clone());
            (load.children_generation, scope)
        };
        tracing::debug!(node_id = parent.id().get(), generation, "children load requested");
        let parent = parent.clone();
        let task_scope = scope.clone();
        self.spawn_task(&scope, async move {
            this.run_children_load(&parent, generation, &task_scope).await;
            task_scope.cancel();
        });
    }

    async fn run_children_load(&self, parent: &ViewNode<M::Node>, generation: u64, scope: &Scope) {
        let computed = self
            .executors
            .background
            .run(scope, self.domain.children(parent.domain()))
            .await;
        let Some(result) = computed else {
            return;
        };
        let domain_children = result.unwrap_or_else(|err| {
            tracing::warn!(node_id = parent.id().get(), generation, error = %err, "children computation failed");
            Vec::new()
        });

        let mut seen = HashSet::with_capacity(domain_children.len());
        let mut nodes = Vec::with_capacity(domain_children.len());
        for child in domain_children {
            if !seen.insert(child.clone()) {
                tracing::debug!(node_id = parent.id().get(), child = ?child, "duplicate child dropped");
                consistency_violation("duplicate child in one children list");
                continue;
            }
            nodes.push(self.create_node(Some(parent), child));
        }

        let Some(loaded) = scope.run(join_all(nodes.iter().map(|n| n.wait_loaded()))).await else {
            return;
        };
        let children = nodes
            .into_iter()
            .zip(loaded)
            .filter_map(|(node, ok)| ok.then_some(node))
            .collect();
        self.commit_children(parent, generation, children);
    }

    fn commit_children(&self, parent: &ViewNode<M::Node>, generation: u64, children: Vec<ViewNode<M::Node>>) {
        let load = parent.inner.load.lock();
        if load.children_generation != generation || parent.is_disposed() {
            tracing::trace!(node_id = parent.id().get(), generation, "stale children dropped");
            return;
        }
        let initial = !parent.inner.children.is_ready();
        let previous = parent.children_now().unwrap_or_default();
        let changes = reconcile(&previous, &children).with_initial(initial);

        for removed in &changes.removed {
            removed.node.dispose();
        }
        let keep: HashSet<NodeId> = changes.children.iter().map(ViewNode::id).collect();
        for orphan in self.registry.children_of(Some(parent.id())) {
            if !keep.contains(&orphan.id()) {
                orphan.dispose();
            }
        }

        tracing::debug!(
            node_id = parent.id().get(),
            generation,
            initial,
            removed = changes.removed.len(),
            inserted = changes.inserted.len(),
            moved = changes.moved.len(),
            "children committed"
        );

        let list: Arc<[ViewNode<M::Node>]> = changes.children.clone().into();
        let kept: Vec<ViewNode<M::Node>> = changes.changed.iter().map(|c| c.node.clone()).collect();
        // Listener first: a reader of the new list may load grandchildren,
        // whose changes must not overtake this one.
        if let Some(listener) = self.listener() {
            listener.children_changed(parent, changes);
        }
        parent.inner.children.publish_ready(generation, list);
        drop(load);

        if self.config.refresh_kept_children {
            for node in &kept {
                self.request_presentation(node);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Requests
    // ─────────────────────────────────────────────────────────────────────

    pub(crate) fn ensure_children(&self, node: &ViewNode<M::Node>) {
        if node.is_disposed() {
            return;
        }
        let load = node.inner.load.lock();
        if !load.children_requested {
            drop(load);
            self.load_children(node);
            return;
        }
        if node.inner.children.is_ready() {
            let children = node.children_now().unwrap_or_default();
            if let Some(listener) = self.listener() {
                listener.children_changed(node, ChangeSet::initial(children));
            }
        }
    }

    pub(crate) fn invalidate(&self, node: &ViewNode<M::Node>, recursive: bool) {
        if node.is_disposed() {
            return;
        }
        if recursive {
            for child in node.children_now().unwrap_or_default() {
                self.invalidate(&child, true);
            }
        }
        self.request_presentation(node);
        if node.children_requested() {
            self.load_children(node);
        }
    }
}
