#![forbid(unsafe_code)]

//! Visitor contract and stock visitors.

use std::fmt;

use arbor_core::TreePath;

/// Decision taken for one visited node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitAction {
    /// Descend into the node's children.
    Continue,
    /// Do not descend; move on to the next sibling.
    SkipChildren,
    /// Do not descend and skip the remaining siblings.
    SkipSiblings,
    /// Stop: this node is the result.
    Interrupt,
}

/// Where a visitor's decision function must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Affinity {
    /// Entirely on the foreground executor.
    #[default]
    Foreground,
    /// `visit` on a background worker, bracketed by foreground
    /// `pre_visit`/`post_visit`.
    Background,
}

/// Decision function driving a walk.
pub trait Visitor<T>: Send + Sync + 'static {
    fn visit(&self, path: &TreePath<T>) -> VisitAction;

    fn affinity(&self) -> Affinity {
        Affinity::Foreground
    }

    /// Foreground hook run before `visit`; `Some` short-circuits it.
    fn pre_visit(&self, _path: &TreePath<T>) -> Option<VisitAction> {
        None
    }

    /// Foreground hook run after `visit`, may override its action.
    fn post_visit(&self, _path: &TreePath<T>, action: VisitAction) -> VisitAction {
        action
    }
}

/// Visitor backed by a closure.
pub struct FnVisitor<F> {
    f: F,
    affinity: Affinity,
}

impl<F> FnVisitor<F> {
    #[must_use]
    pub fn new(f: F) -> Self {
        Self {
            f,
            affinity: Affinity::Foreground,
        }
    }

    #[must_use]
    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }
}

impl<F> fmt::Debug for FnVisitor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnVisitor")
            .field("affinity", &self.affinity)
            .finish()
    }
}

impl<T, F> Visitor<T> for FnVisitor<F>
where
    F: Fn(&TreePath<T>) -> VisitAction + Send + Sync + 'static,
{
    fn visit(&self, path: &TreePath<T>) -> VisitAction {
        (self.f)(path)
    }

    fn affinity(&self) -> Affinity {
        self.affinity
    }
}

/// Visitor interrupting at the first node matching `predicate`.
pub fn find<T, P>(predicate: P) -> FnVisitor<impl Fn(&TreePath<T>) -> VisitAction + Send + Sync + 'static>
where
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    FnVisitor::new(move |path: &TreePath<T>| {
        if predicate(path.last()) {
            VisitAction::Interrupt
        } else {
            VisitAction::Continue
        }
    })
}

/// Visitor descending along a known sequence of nodes.
///
/// Subtrees that leave the target sequence are skipped, so only one branch
/// per level is loaded.
#[derive(Debug, Clone)]
pub struct PathVisitor<K> {
    target: Vec<K>,
}

impl<K> PathVisitor<K> {
    #[must_use]
    pub fn new(target: Vec<K>) -> Self {
        Self { target }
    }
}

impl<T, K> Visitor<T> for PathVisitor<K>
where
    T: PartialEq<K>,
    K: Send + Sync + 'static,
{
    fn visit(&self, path: &TreePath<T>) -> VisitAction {
        let depth = path.len();
        match self.target.get(depth - 1) {
            Some(expected) if path.last() == expected => {
                if depth == self.target.len() {
                    VisitAction::Interrupt
                } else {
                    VisitAction::Continue
                }
            }
            _ => VisitAction::SkipChildren,
        }
    }
}
