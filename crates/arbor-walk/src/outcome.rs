#![forbid(unsafe_code)]

//! Walk results and faults.

use arbor_core::{ExecutorError, TreePath};

use crate::state::WalkState;

/// Internal fault that ends one walk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    /// An event arrived in a state that cannot accept it.
    #[error("invalid walk transition {from:?} -> {to:?}")]
    InvalidTransition { from: WalkState, to: WalkState },
    /// The foreground executor went away mid-walk.
    #[error("foreground executor lost")]
    ForegroundLost,
    /// The visitor panicked while deciding.
    #[error("visitor panicked: {0}")]
    VisitorPanicked(String),
    /// A caller-reported failure.
    #[error("{0}")]
    Aborted(String),
}

impl From<ExecutorError> for WalkError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Panicked(message) => WalkError::VisitorPanicked(message),
            ExecutorError::Shutdown | ExecutorError::NoRuntime | ExecutorError::Spawn(_) => {
                WalkError::ForegroundLost
            }
        }
    }
}

/// Single result of a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome<T> {
    /// The visitor interrupted at this path.
    Found(TreePath<T>),
    /// The tree was exhausted.
    NotFound,
    /// The walk's scope was cancelled before a result.
    Cancelled,
    /// The walk failed internally.
    Failed(WalkError),
}

impl<T> WalkOutcome<T> {
    #[must_use]
    pub fn found(&self) -> Option<&TreePath<T>> {
        match self {
            WalkOutcome::Found(path) => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_found(self) -> Option<TreePath<T>> {
        match self {
            WalkOutcome::Found(path) => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, WalkOutcome::Found(_))
    }

    /// Transform the node type of a found path.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(&T) -> U) -> WalkOutcome<U> {
        match self {
            WalkOutcome::Found(path) => WalkOutcome::Found(path.map(f)),
            WalkOutcome::NotFound => WalkOutcome::NotFound,
            WalkOutcome::Cancelled => WalkOutcome::Cancelled,
            WalkOutcome::Failed(err) => WalkOutcome::Failed(err),
        }
    }
}
