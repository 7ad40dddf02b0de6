#![forbid(unsafe_code)]

//! Hierarchical cancellation scopes.
//!
//! A [`Scope`] owns the lifetime of asynchronous work. Scopes form a tree:
//! cancelling a scope synchronously cancels every descendant, runs the
//! registered on-cancel callbacks and wakes every task waiting on it.
//! Cancellation never travels upward.
//!
//! Cancellation means "stop waiting and drop the result". Work wrapped with
//! [`Scope::run`] resolves to `None` once the scope is cancelled; the wrapped
//! future is dropped at its next suspension point.
//!
//! # Invariants
//!
//! 1. `cancel` is idempotent; callbacks run exactly once.
//! 2. A child created from a cancelled parent is born cancelled.
//! 3. A callback registered on a cancelled scope runs immediately.
//! 4. Parents hold children weakly; a dropped, uncancelled child never runs
//!    its callbacks.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

type Callback = Box<dyn FnOnce() + Send + 'static>;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    name: String,
    cancelled: AtomicBool,
    notify: watch::Sender<bool>,
    state: Mutex<State>,
    parent: Option<Weak<Inner>>,
}

#[derive(Default)]
struct State {
    children: HashMap<u64, Weak<Inner>>,
    callbacks: Vec<Callback>,
}

/// Node in a tree of cancellation tokens.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Inner>,
}

impl Scope {
    /// Create a top-level scope.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self::with_parent(name.into(), None)
    }

    fn with_parent(name: String, parent: Option<Weak<Inner>>) -> Self {
        let (notify, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                name,
                cancelled: AtomicBool::new(false),
                notify,
                state: Mutex::new(State::default()),
                parent,
            }),
        }
    }

    /// Create a scope nested under this one.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Scope {
        let child = Self::with_parent(name.into(), Some(Arc::downgrade(&self.inner)));
        let born_cancelled = {
            let mut state = self.inner.state.lock();
            if self.inner.cancelled.load(Ordering::Acquire) {
                true
            } else {
                state
                    .children
                    .insert(child.inner.id, Arc::downgrade(&child.inner));
                false
            }
        };
        if born_cancelled {
            child.cancel();
        }
        child
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Number of live, uncancelled children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .children
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Cancel this scope and all of its descendants.
    pub fn cancel(&self) {
        Self::cancel_inner(&self.inner);
    }

    fn cancel_inner(inner: &Arc<Inner>) {
        if inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let (children, callbacks) = {
            let mut state = inner.state.lock();
            (
                std::mem::take(&mut state.children),
                std::mem::take(&mut state.callbacks),
            )
        };
        tracing::trace!(
            scope_id = inner.id,
            scope = %inner.name,
            children = children.len(),
            "scope cancelled"
        );

        for child in children.into_values() {
            if let Some(child) = child.upgrade() {
                Self::cancel_inner(&child);
            }
        }
        for callback in callbacks {
            callback();
        }
        inner.notify.send_replace(true);

        if let Some(parent) = inner.parent.as_ref().and_then(Weak::upgrade) {
            parent.state.lock().children.remove(&inner.id);
        }
    }

    /// Register `f` to run when this scope is cancelled.
    pub fn on_cancel(&self, f: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.inner.state.lock();
            if !self.inner.cancelled.load(Ordering::Acquire) {
                state.callbacks.push(Box::new(f));
                return;
            }
        }
        f();
    }

    /// Resolve once this scope is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.notify.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Drive `fut` until it completes or the scope is cancelled.
    pub async fn run<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            value = fut => {
                if self.is_cancelled() { None } else { Some(value) }
            }
        }
    }

    /// Spawn `fut` on the runtime, bound to this scope.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let scope = self.clone();
        tokio::spawn(async move { scope.run(fut).await })
    }

    /// Guard that cancels this scope when dropped.
    #[must_use]
    pub fn cancel_on_drop(&self) -> ScopeGuard {
        ScopeGuard {
            scope: self.clone(),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels its scope on drop.
#[derive(Debug)]
pub struct ScopeGuard {
    scope: Scope,
}

impl ScopeGuard {
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn cancel_cascades_downward_only() {
        let root = Scope::root("root");
        let a = root.child("a");
        let b = a.child("b");
        let sibling = root.child("sibling");

        a.cancel();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(!root.is_cancelled());
        assert!(!sibling.is_cancelled());
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn callbacks_run_once() {
        let scope = Scope::root("s");
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        scope.on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        scope.cancel();
        scope.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_callback_runs_immediately() {
        let scope = Scope::root("s");
        scope.cancel();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        scope.on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn child_of_cancelled_is_born_cancelled() {
        let root = Scope::root("root");
        root.cancel();
        let child = root.child("late");
        assert!(child.is_cancelled());
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn descendant_callbacks_run_on_ancestor_cancel() {
        let root = Scope::root("root");
        let leaf = root.child("a").child("b");
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        leaf.on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        root.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_cancels_on_drop() {
        let scope = Scope::root("guarded");
        {
            let _guard = scope.cancel_on_drop();
        }
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn run_completes_when_not_cancelled() {
        let scope = Scope::root("s");
        assert_eq!(scope.run(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn run_drops_result_on_cancel() {
        let scope = Scope::root("s");
        let s = scope.clone();
        let handle = tokio::spawn(async move {
            s.run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                1
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        scope.cancel();
        assert_eq!(handle.await.unwrap(), None);
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let scope = Scope::root("s").child("c");
        let s = scope.clone();
        let waiter = tokio::spawn(async move { s.cancelled().await });
        scope.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
    }

    #[tokio::test]
    async fn spawn_on_cancelled_scope_yields_none() {
        let scope = Scope::root("s");
        scope.cancel();
        let handle = scope.spawn(async { 5 });
        assert_eq!(handle.await.unwrap(), None);
    }
}
