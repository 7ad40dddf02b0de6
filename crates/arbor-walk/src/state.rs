#![forbid(unsafe_code)]

//! Explicit depth-first walk state machine.
//!
//! [`TreeWalker`] owns the traversal frontier and nothing else: it never
//! calls a visitor or a data source itself. Every step returns a
//! [`WalkStep`] telling the driver what it needs next (a decision for a
//! path, or the children of a path), and the driver feeds the answer back.
//! The same machine serves the synchronous [`walk_sync`] driver and the
//! asynchronous engine, where any answer may arrive after a suspension.
//!
//! # Transitions
//!
//! ```text
//!   Initial ─────────────┐
//!   VisitingNode ────────┼──► LookingForNextNode ──► VisitingNode
//!   RequestingChildren ──┘            │                   │
//!                                     ▼                   ▼
//!                                  Success ◄──── RequestingChildren (via Continue)
//!
//!   any state except Success ──► Failure
//! ```
//!
//! An event delivered in a state that cannot accept it fails the walk with
//! [`WalkError::InvalidTransition`].

use std::collections::VecDeque;

use arbor_core::TreePath;

use crate::outcome::{WalkError, WalkOutcome};
use crate::visitor::VisitAction;

/// State of a [`TreeWalker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkState {
    Initial,
    LookingForNextNode,
    VisitingNode,
    RequestingChildren,
    Success,
    Failure,
}

impl WalkState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: WalkState) -> bool {
        use WalkState::*;
        match (self, next) {
            (Initial | VisitingNode | RequestingChildren, LookingForNextNode) => true,
            (LookingForNextNode, VisitingNode) => true,
            (VisitingNode, RequestingChildren) => true,
            (LookingForNextNode | VisitingNode, Success) => true,
            (Success | Failure, _) => false,
            (_, Failure) => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, WalkState::Success | WalkState::Failure)
    }
}

/// What the driver must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkStep<T> {
    /// Decide on this path and report with [`TreeWalker::visited`].
    Visit(TreePath<T>),
    /// Supply the children of this path with [`TreeWalker::set_children`].
    NeedChildren(TreePath<T>),
    /// The walk is over.
    Done(WalkOutcome<T>),
}

struct Level<T> {
    parent: Option<TreePath<T>>,
    pending: VecDeque<T>,
}

/// Depth-first walker driven by explicit events.
pub struct TreeWalker<T> {
    state: WalkState,
    stack: Vec<Level<T>>,
    current: Option<TreePath<T>>,
    outcome: Option<WalkOutcome<T>>,
    visited: usize,
}

impl<T: Clone> Default for TreeWalker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TreeWalker<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: WalkState::Initial,
            stack: Vec::new(),
            current: None,
            outcome: None,
            visited: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> WalkState {
        self.state
    }

    /// Number of decisions received so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited
    }

    /// Final outcome, once terminal.
    #[must_use]
    pub fn outcome(&self) -> Option<&WalkOutcome<T>> {
        self.outcome.as_ref()
    }

    /// Begin the walk at `root`; `None` means an empty tree.
    pub fn start(&mut self, root: Option<T>) -> WalkStep<T> {
        if !self.transition(WalkState::LookingForNextNode) {
            return self.done();
        }
        self.stack.push(Level {
            parent: None,
            pending: root.into_iter().collect(),
        });
        self.advance()
    }

    /// Report the visitor's decision for the path last handed out.
    pub fn visited(&mut self, action: VisitAction) -> WalkStep<T> {
        if self.state != WalkState::VisitingNode {
            let to = match action {
                VisitAction::Continue => WalkState::RequestingChildren,
                VisitAction::Interrupt => WalkState::Success,
                VisitAction::SkipChildren | VisitAction::SkipSiblings => {
                    WalkState::LookingForNextNode
                }
            };
            return self.invalid(to);
        }
        self.visited += 1;
        match action {
            VisitAction::Interrupt => {
                let found = self.current.take();
                self.transition(WalkState::Success);
                self.outcome = Some(match found {
                    Some(path) => WalkOutcome::Found(path),
                    None => WalkOutcome::NotFound,
                });
                self.done()
            }
            VisitAction::Continue => {
                self.transition(WalkState::RequestingChildren);
                match self.current.clone() {
                    Some(path) => WalkStep::NeedChildren(path),
                    None => self.invalid(WalkState::RequestingChildren),
                }
            }
            VisitAction::SkipChildren => {
                self.current = None;
                self.transition(WalkState::LookingForNextNode);
                self.advance()
            }
            VisitAction::SkipSiblings => {
                self.current = None;
                if let Some(level) = self.stack.last_mut() {
                    level.pending.clear();
                }
                self.transition(WalkState::LookingForNextNode);
                self.advance()
            }
        }
    }

    /// Resume after a children request.
    pub fn set_children(&mut self, children: Vec<T>) -> WalkStep<T> {
        if self.state != WalkState::RequestingChildren {
            return self.invalid(WalkState::LookingForNextNode);
        }
        let parent = self.current.take();
        self.transition(WalkState::LookingForNextNode);
        if !children.is_empty() {
            self.stack.push(Level {
                parent,
                pending: children.into(),
            });
        }
        self.advance()
    }

    /// Fail the walk with `error`.
    pub fn set_error(&mut self, error: WalkError) -> WalkStep<T> {
        if self.transition(WalkState::Failure) {
            self.outcome = Some(WalkOutcome::Failed(error));
        }
        self.done()
    }

    /// Abandon the walk; resolves as cancelled unless already terminal.
    pub fn cancel(&mut self) -> WalkStep<T> {
        if !self.state.is_terminal() && self.transition(WalkState::Failure) {
            self.outcome = Some(WalkOutcome::Cancelled);
        }
        self.done()
    }

    fn advance(&mut self) -> WalkStep<T> {
        debug_assert_eq!(self.state, WalkState::LookingForNextNode);
        loop {
            let Some(level) = self.stack.last_mut() else {
                self.transition(WalkState::Success);
                self.outcome = Some(WalkOutcome::NotFound);
                return self.done();
            };
            let Some(node) = level.pending.pop_front() else {
                self.stack.pop();
                continue;
            };
            let path = match &level.parent {
                Some(parent) => parent.child(node),
                None => TreePath::root(node),
            };
            self.transition(WalkState::VisitingNode);
            self.current = Some(path.clone());
            return WalkStep::Visit(path);
        }
    }

    fn transition(&mut self, next: WalkState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        tracing::trace!(from = ?self.state, to = ?next, "walk transition");
        self.state = next;
        true
    }

    fn invalid(&mut self, to: WalkState) -> WalkStep<T> {
        let from = self.state;
        if !from.is_terminal() {
            tracing::warn!(?from, ?to, "invalid walk transition");
            self.state = WalkState::Failure;
            self.outcome = Some(WalkOutcome::Failed(WalkError::InvalidTransition { from, to }));
        }
        self.done()
    }

    fn done(&self) -> WalkStep<T> {
        match &self.outcome {
            Some(outcome) => WalkStep::Done(outcome.clone()),
            None => WalkStep::Done(WalkOutcome::Failed(WalkError::InvalidTransition {
                from: self.state,
                to: WalkState::Success,
            })),
        }
    }
}

/// Drive a [`TreeWalker`] with synchronous callbacks.
pub fn walk_sync<T: Clone>(
    root: Option<T>,
    mut visit: impl FnMut(&TreePath<T>) -> VisitAction,
    mut children: impl FnMut(&TreePath<T>) -> Vec<T>,
) -> WalkOutcome<T> {
    let mut walker = TreeWalker::new();
    let mut step = walker.start(root);
    loop {
        step = match step {
            WalkStep::Visit(path) => walker.visited(visit(&path)),
            WalkStep::NeedChildren(path) => walker.set_children(children(&path)),
            WalkStep::Done(outcome) => return outcome,
        };
    }
}
