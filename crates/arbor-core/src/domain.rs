#![forbid(unsafe_code)]

//! The domain model contract.
//!
//! A domain model supplies the actual data behind the tree. Every operation
//! is asynchronous and may be slow; the core calls them from background tasks
//! and never holds a lock across them.
//!
//! A presentation is delivered as a stream so a model can emit a quick first
//! snapshot (a name) and refine it (sizes, decorations) without the widget
//! painting a blank row in between.

use std::error::Error as StdError;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::node::DomainNode;
use crate::presentation::Presentation;

/// Fault raised by a domain model operation.
///
/// The core treats a faulted node as having disappeared; the fault never
/// propagates to siblings or ancestors.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DomainError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl DomainError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source("i/o failure", err)
    }
}

/// Asynchronous source of tree data.
///
/// Implementations must be cheap to share behind an `Arc`; returned futures
/// own whatever they need (`'static`) so they can run on background tasks.
pub trait DomainModel: Send + Sync + 'static {
    type Node: DomainNode;

    /// Compute the root node, `None` for an empty tree.
    fn root(&self) -> BoxFuture<'static, Result<Option<Self::Node>, DomainError>>;

    /// Compute the ordered children of `node`.
    fn children(&self, node: &Self::Node) -> BoxFuture<'static, Result<Vec<Self::Node>, DomainError>>;

    /// Whether `node` can never have children.
    fn is_leaf(&self, node: &Self::Node) -> BoxFuture<'static, Result<bool, DomainError>>;

    /// Successive presentation snapshots of `node`, best last.
    fn presentation(&self, node: &Self::Node) -> BoxStream<'static, Result<Presentation, DomainError>>;
}
