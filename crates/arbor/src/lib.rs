#![forbid(unsafe_code)]

//! Arbor public facade crate.
//!
//! Re-exports the pieces most applications need from the internal crates
//! and offers a prelude plus [`tree`], which wires a domain model to a
//! widget adapter in one call.

use std::sync::Arc;

// --- Core re-exports -------------------------------------------------------

pub use arbor_core::logging::{LOG_ENV, LogFormat, LoggingError};
pub use arbor_core::{
    Background, DomainError, DomainModel, DomainNode, Executors, ExecutorError, Foreground,
    Fragment, NodeId, NodeLifecycle, Presentation, PresentationBuilder, Scope, TextAttributes,
    TreeModelConfig, TreePath,
};

#[cfg(feature = "tracing-json")]
pub use arbor_core::logging::install_subscriber;

// --- Walk re-exports -------------------------------------------------------

pub use arbor_walk::{
    Affinity, FnVisitor, PathVisitor, VisitAction, Visitor, WalkError, WalkOutcome, WalkSource,
    find, walk,
};

// --- Model re-exports ------------------------------------------------------

#[cfg(feature = "snapshot-persistence")]
pub use arbor_model::FileSnapshotStore;
pub use arbor_model::{
    ChangeSet, ModelListener, SnapshotError, SnapshotNode, SnapshotSource, TreeSnapshot,
    TreeViewModel, ViewNode,
};

// --- Widget re-exports -----------------------------------------------------

pub use arbor_widget::{
    TreeAdapter, TreeGuides, TreeModelEvent, TreeModelListener, WidgetNode, WidgetPath,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for arbor setup and persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Executor setup or foreground failure.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// Snapshot storage failure.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Subscriber installation failure.
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Standard result type for arbor APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Build executors from `config`, wrap `domain` in a view model and attach
/// a widget adapter to it.
///
/// Must be called from within a tokio runtime.
pub fn tree<M: DomainModel>(domain: Arc<M>, config: TreeModelConfig) -> Result<TreeAdapter<M>> {
    let executors = Executors::from_config(&config)?;
    let model = TreeViewModel::new(domain, executors, config);
    Ok(TreeAdapter::new(model))
}

/// Like [`tree`], showing `snapshot` until the live root arrives.
pub fn tree_with_snapshot<M: DomainModel>(
    domain: Arc<M>,
    config: TreeModelConfig,
    snapshot: &dyn SnapshotSource,
) -> Result<TreeAdapter<M>> {
    let executors = Executors::from_config(&config)?;
    let model = TreeViewModel::new(domain, executors, config);
    Ok(TreeAdapter::with_snapshot(model, snapshot))
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        DomainError, DomainModel, Error, Presentation, Result, Scope, TreeAdapter,
        TreeModelConfig, TreeModelListener, TreePath, TreeViewModel, ViewNode, VisitAction,
        Visitor, WalkOutcome, WidgetNode, tree,
    };

    pub use crate::{core, model, walk, widget};
}

pub use arbor_core as core;
pub use arbor_model as model;
pub use arbor_walk as walk;
pub use arbor_widget as widget;

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_model::testing::MemoryDomain;

    #[test]
    fn tree_requires_runtime() {
        let domain = Arc::new(MemoryDomain::from_edges("r", &[]));
        let err = tree(domain, TreeModelConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Executor(ExecutorError::NoRuntime)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tree_wires_domain_to_widget() {
        let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a"])]));
        let adapter = tree(domain, TreeModelConfig::default()).unwrap();
        adapter.settle().await;
        let root = adapter.root().expect("root");
        assert_eq!(root.label(), "r");
        assert_eq!(adapter.executors().background.max_concurrency(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn find_through_prelude() {
        use crate::prelude::*;

        let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a", "b"])]));
        let adapter = tree(domain, TreeModelConfig::default()).unwrap();
        let scope = Scope::root("facade");
        let outcome = adapter
            .accept(Arc::new(walk::find(|n: &ViewNode<String>| n.domain() == "b")), &scope)
            .await;
        let path = outcome.into_found().expect("found");
        assert_eq!(path.last().domain(), "b");
    }
}
