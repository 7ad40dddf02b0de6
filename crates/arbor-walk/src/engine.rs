#![forbid(unsafe_code)]

//! Asynchronous walk engine.
//!
//! [`walk`] drives a [`TreeWalker`] over any [`WalkSource`], honoring the
//! visitor's [`Affinity`]:
//!
//! - `Foreground`: `pre_visit`, `visit` and `post_visit` run as one job on
//!   the foreground executor.
//! - `Background`: `pre_visit` runs on the foreground executor (a `Some`
//!   result short-circuits), `visit` runs on a blocking worker while holding
//!   a background permit, `post_visit` runs on the foreground executor.
//!
//! Only one node is in flight per walk, so the foreground phases of two
//! nodes of the same walk never interleave. The whole walk is bound to a
//! [`Scope`]: cancelling it resolves the walk as
//! [`WalkOutcome::Cancelled`], even if a result was just produced.

use std::sync::Arc;

use arbor_core::error::panic_message;
use arbor_core::{Executors, Scope, TreePath};
use futures::future::BoxFuture;

use crate::outcome::{WalkError, WalkOutcome};
use crate::state::{TreeWalker, WalkStep};
use crate::visitor::{Affinity, VisitAction, Visitor};

/// Tree-shaped data a walk can run over.
pub trait WalkSource<T>: Send + Sync {
    /// The root, `None` for an empty tree.
    fn root(&self) -> BoxFuture<'_, Option<T>>;

    /// Children of the last node of `path`. `None` when the node
    /// disappeared; the walk then treats it as childless.
    fn children<'a>(&'a self, path: &'a TreePath<T>) -> BoxFuture<'a, Option<Vec<T>>>;

    /// Wait until the last node of `path` may be visited. `false` skips the
    /// node and its subtree.
    fn prepare<'a>(&'a self, _path: &'a TreePath<T>) -> BoxFuture<'a, bool> {
        Box::pin(async { true })
    }
}

/// Walk `source` depth-first until `visitor` interrupts.
pub async fn walk<T, S, V>(
    source: &S,
    visitor: Arc<V>,
    executors: &Executors,
    scope: &Scope,
) -> WalkOutcome<T>
where
    T: Clone + Send + Sync + 'static,
    S: WalkSource<T> + ?Sized,
    V: Visitor<T> + ?Sized,
{
    let drive = async {
        let mut walker = TreeWalker::new();
        let root = source.root().await;
        let mut step = walker.start(root);
        loop {
            step = match step {
                WalkStep::Done(outcome) => return outcome,
                WalkStep::Visit(path) => {
                    if !source.prepare(&path).await {
                        tracing::trace!(depth = path.len(), "node vanished before visit");
                        walker.visited(VisitAction::SkipChildren)
                    } else {
                        match decide(&visitor, &path, executors, scope).await {
                            Ok(Some(action)) => walker.visited(action),
                            Ok(None) => walker.cancel(),
                            Err(err) => {
                                tracing::warn!(error = %err, "walk failed");
                                walker.set_error(err)
                            }
                        }
                    }
                }
                WalkStep::NeedChildren(path) => {
                    let children = source.children(&path).await.unwrap_or_default();
                    walker.set_children(children)
                }
            };
        }
    };
    let outcome = scope.run(drive).await.unwrap_or(WalkOutcome::Cancelled);
    tracing::debug!(
        found = outcome.is_found(),
        cancelled = matches!(outcome, WalkOutcome::Cancelled),
        "walk finished"
    );
    outcome
}

/// Obtain the visitor's decision for `path`. `Ok(None)` means the scope was
/// cancelled while waiting for a background permit.
async fn decide<T, V>(
    visitor: &Arc<V>,
    path: &TreePath<T>,
    executors: &Executors,
    scope: &Scope,
) -> Result<Option<VisitAction>, WalkError>
where
    T: Clone + Send + Sync + 'static,
    V: Visitor<T> + ?Sized,
{
    match visitor.affinity() {
        Affinity::Foreground => {
            let v = Arc::clone(visitor);
            let p = path.clone();
            let action = executors
                .foreground
                .run(move || match v.pre_visit(&p) {
                    Some(action) => action,
                    None => {
                        let action = v.visit(&p);
                        v.post_visit(&p, action)
                    }
                })
                .await?;
            Ok(Some(action))
        }
        Affinity::Background => {
            let v = Arc::clone(visitor);
            let p = path.clone();
            if let Some(action) = executors.foreground.run(move || v.pre_visit(&p)).await? {
                return Ok(Some(action));
            }

            let Some(permit) = executors.background.acquire(scope).await else {
                return Ok(None);
            };
            let v = Arc::clone(visitor);
            let p = path.clone();
            let joined = executors
                .background
                .runtime()
                .spawn_blocking(move || v.visit(&p))
                .await;
            drop(permit);
            let action = match joined {
                Ok(action) => action,
                Err(err) if err.is_panic() => {
                    let payload = err.into_panic();
                    return Err(WalkError::VisitorPanicked(panic_message(payload.as_ref())));
                }
                Err(_) => return Ok(None),
            };

            let v = Arc::clone(visitor);
            let p = path.clone();
            let action = executors
                .foreground
                .run(move || v.post_visit(&p, action))
                .await?;
            Ok(Some(action))
        }
    }
}
