#![forbid(unsafe_code)]

//! Identity-stable view model over an asynchronous domain model.
//!
//! # Role in arbor
//! `arbor-model` caches what the domain model computes: one [`ViewNode`]
//! per domain node and parent, its presentation, and its children. Reloads
//! are reconciled ([`diff::reconcile`]) so kept nodes keep their identity.
//!
//! # Primary responsibilities
//! - **TreeViewModel**: root, children and presentation loading with
//!   latest-wins cancellation.
//! - **ViewNode**: per-node scope, lifecycle and cached values.
//! - **Snapshot**: a read-only cached tree to show before the live one.
//! - **Walk sources**: walk the domain or the view model with `arbor-walk`.

pub mod diff;
mod loading;
pub mod model;
mod registry;
pub mod snapshot;
pub mod source;
pub mod testing;
pub mod view_node;

pub use diff::{ChangeSet, DiffEvents, Indexed, Moved, diff, reconcile};
pub use model::{ModelListener, TreeViewModel};
#[cfg(feature = "snapshot-persistence")]
pub use snapshot::FileSnapshotStore;
pub use snapshot::{SnapshotError, SnapshotNode, SnapshotSource, TreeSnapshot};
pub use source::{DomainWalkSource, ViewModelWalkSource};
pub use view_node::ViewNode;
