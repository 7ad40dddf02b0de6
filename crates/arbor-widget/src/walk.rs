#![forbid(unsafe_code)]

//! Visitor walks over published nodes.

use std::sync::Arc;

use arbor_core::{DomainModel, Scope, TreePath};
use arbor_model::{TreeViewModel, ViewNode};
use arbor_walk::{Visitor, WalkOutcome, WalkSource, walk};
use futures::future::BoxFuture;

use crate::adapter::TreeAdapter;

/// Walks the live tree, handing each node to the visitor only once the
/// widget has been told about it. Children are loaded on demand.
pub struct AdapterWalkSource<M: DomainModel> {
    model: TreeViewModel<M>,
}

impl<M: DomainModel> AdapterWalkSource<M> {
    #[must_use]
    pub fn new(adapter: &TreeAdapter<M>) -> Self {
        Self {
            model: adapter.model().clone(),
        }
    }
}

impl<M: DomainModel> WalkSource<ViewNode<M::Node>> for AdapterWalkSource<M> {
    fn root(&self) -> BoxFuture<'_, Option<ViewNode<M::Node>>> {
        Box::pin(async move {
            let root = self.model.root().await?;
            root.wait_published().await.then_some(root)
        })
    }

    fn children<'a>(
        &'a self,
        path: &'a TreePath<ViewNode<M::Node>>,
    ) -> BoxFuture<'a, Option<Vec<ViewNode<M::Node>>>> {
        Box::pin(path.last().current_children())
    }

    fn prepare<'a>(&'a self, path: &'a TreePath<ViewNode<M::Node>>) -> BoxFuture<'a, bool> {
        Box::pin(path.last().wait_published())
    }
}

impl<M: DomainModel> TreeAdapter<M> {
    /// Walk the published tree with `visitor` until it interrupts.
    ///
    /// Suspends on nodes that are still loading; a node disposed while the
    /// walk waits on it is skipped with its subtree.
    ///
    /// The walk loads children through the model whenever it descends, even
    /// with [`set_loading_allowed(false)`](Self::set_loading_allowed): the
    /// loading gate governs widget reads only.
    pub async fn accept<V>(&self, visitor: Arc<V>, scope: &Scope) -> WalkOutcome<ViewNode<M::Node>>
    where
        V: Visitor<ViewNode<M::Node>> + ?Sized,
    {
        let source = AdapterWalkSource::new(self);
        let scope = scope.child("accept");
        let outcome = walk(&source, visitor, self.executors(), &scope).await;
        scope.cancel();
        outcome
    }
}
