#![forbid(unsafe_code)]

//! Walk sources over the domain model and over the view model.

use std::sync::Arc;

use arbor_core::{DomainModel, TreePath};
use arbor_walk::WalkSource;
use futures::future::BoxFuture;

use crate::model::TreeViewModel;
use crate::view_node::ViewNode;

/// Walks the domain model directly, without caching.
///
/// Domain faults end the affected branch: a failed root is an empty tree,
/// failed children are none.
pub struct DomainWalkSource<M: DomainModel> {
    domain: Arc<M>,
}

impl<M: DomainModel> DomainWalkSource<M> {
    #[must_use]
    pub fn new(domain: Arc<M>) -> Self {
        Self { domain }
    }
}

impl<M: DomainModel> WalkSource<M::Node> for DomainWalkSource<M> {
    fn root(&self) -> BoxFuture<'_, Option<M::Node>> {
        let fut = self.domain.root();
        Box::pin(async move {
            fut.await.unwrap_or_else(|err| {
                tracing::warn!(error = %err, "root computation failed during walk");
                None
            })
        })
    }

    fn children<'a>(&'a self, path: &'a TreePath<M::Node>) -> BoxFuture<'a, Option<Vec<M::Node>>> {
        let fut = self.domain.children(path.last());
        Box::pin(async move {
            match fut.await {
                Ok(children) => Some(children),
                Err(err) => {
                    tracing::warn!(depth = path.len(), error = %err, "children computation failed during walk");
                    None
                }
            }
        })
    }
}

/// Walks the view model, loading children on demand.
///
/// Nodes are visited only once loaded; a node disposed while the walk
/// waits on it is skipped along with its subtree.
pub struct ViewModelWalkSource<M: DomainModel> {
    model: TreeViewModel<M>,
}

impl<M: DomainModel> ViewModelWalkSource<M> {
    #[must_use]
    pub fn new(model: TreeViewModel<M>) -> Self {
        Self { model }
    }
}

impl<M: DomainModel> WalkSource<ViewNode<M::Node>> for ViewModelWalkSource<M> {
    fn root(&self) -> BoxFuture<'_, Option<ViewNode<M::Node>>> {
        Box::pin(self.model.root())
    }

    fn children<'a>(
        &'a self,
        path: &'a TreePath<ViewNode<M::Node>>,
    ) -> BoxFuture<'a, Option<Vec<ViewNode<M::Node>>>> {
        Box::pin(path.last().current_children())
    }

    fn prepare<'a>(&'a self, path: &'a TreePath<ViewNode<M::Node>>) -> BoxFuture<'a, bool> {
        Box::pin(path.last().wait_loaded())
    }
}
