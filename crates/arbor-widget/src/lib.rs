#![forbid(unsafe_code)]

//! Synchronous tree-widget adapter.
//!
//! # Role in arbor
//! `arbor-widget` sits between the asynchronous view model and a widget
//! that asks synchronous questions (`root`, `child`, `child_count`). It
//! answers from a mirror of published state and turns model changes into
//! ordered widget events on the foreground executor.
//!
//! # Primary responsibilities
//! - **TreeAdapter**: the widget contract, the loading gate and the
//!   publish protocol.
//! - **Events**: structure, removal, insertion, change, selection and
//!   scroll notifications.
//! - **Snapshots**: cached nodes shown before the live root, and capture of
//!   the shown tree.
//! - **Outline**: guide-drawn text rendering of the shown tree.

pub mod adapter;
pub mod capture;
pub mod event;
pub mod node;
pub mod outline;
mod state;
pub mod walk;

pub use adapter::TreeAdapter;
pub use event::{TreeModelEvent, TreeModelListener, WidgetPath};
pub use node::{CachedNode, PlaceholderNode, WidgetNode};
pub use outline::TreeGuides;
pub use walk::AdapterWalkSource;
