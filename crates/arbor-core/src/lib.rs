#![forbid(unsafe_code)]

//! Core: node identity and lifecycle, paths, presentations, the domain model
//! contract, cancellation scopes, latest-wins cells and executors.
//!
//! # Key Components
//!
//! - [`DomainModel`] - Asynchronous source of tree data
//! - [`Scope`] - Hierarchical cancellation token
//! - [`Latest`] - Generation-stamped latest-wins value
//! - [`Executors`] - Foreground thread plus semaphore-gated background pool
//! - [`TreeModelConfig`] - Shared settings, overridable from `ARBOR_*` variables

pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod latest;
pub mod logging;
pub mod node;
pub mod path;
pub mod presentation;
pub mod scope;

pub use config::TreeModelConfig;
pub use domain::{DomainError, DomainModel};
pub use error::{ExecutorError, consistency_violation};
pub use executor::{Background, Executors, Foreground};
pub use latest::Latest;
pub use node::{DomainNode, NodeId, NodeLifecycle};
pub use path::TreePath;
pub use presentation::{Fragment, Presentation, PresentationBuilder, TextAttributes};
pub use scope::{Scope, ScopeGuard};
