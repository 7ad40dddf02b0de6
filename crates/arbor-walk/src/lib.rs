#![forbid(unsafe_code)]

//! Walker / visitor engine.
//!
//! A cancellable depth-first traversal over any tree-shaped data that finds
//! the first path a [`Visitor`] interrupts at. The traversal frontier is an
//! explicit state machine ([`TreeWalker`]); [`walk`] drives it
//! asynchronously over a [`WalkSource`] and [`walk_sync`] drives it with
//! plain callbacks.

pub mod engine;
pub mod outcome;
pub mod state;
pub mod visitor;

pub use engine::{WalkSource, walk};
pub use outcome::{WalkError, WalkOutcome};
pub use state::{TreeWalker, WalkState, WalkStep, walk_sync};
pub use visitor::{Affinity, FnVisitor, PathVisitor, VisitAction, Visitor, find};
