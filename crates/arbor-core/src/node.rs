#![forbid(unsafe_code)]

//! Node identity and lifecycle.
//!
//! Every node owned by the tree model (live view nodes, nodes restored from a
//! snapshot, loading placeholders) carries a [`NodeId`] that is unique for the
//! lifetime of the process. Domain nodes are opaque to the core and only need
//! value identity, expressed by the [`DomainNode`] bound.
//!
//! # Lifecycle
//!
//! ```text
//!   Created ──► Loaded ──► Published ──► Disposed
//!      │           │            ▲            ▲
//!      └───────────┴────────────┼────────────┘
//!                               │
//!   Cached ─────────────────────┘ (snapshot origin, never loads)
//! ```
//!
//! A node is visitable only once [`NodeLifecycle::Published`] or
//! [`NodeLifecycle::Cached`]. `Disposed` is terminal.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity and equality contract for nodes supplied by a domain model.
///
/// Blanket-implemented for every type with the required bounds.
pub trait DomainNode: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> DomainNode for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Process-unique identifier of a core-owned node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    /// Allocate a fresh identifier.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, for logging.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a core-owned node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLifecycle {
    /// Allocated, presentation not yet computed.
    Created,
    /// Presentation and leaf flag computed, not yet announced to the widget.
    Loaded,
    /// The structural event introducing this node has been delivered.
    Published,
    /// Materialized from a snapshot; visitable but never loaded.
    Cached,
    /// Owning scope cancelled. Terminal.
    Disposed,
}

impl NodeLifecycle {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: NodeLifecycle) -> bool {
        use NodeLifecycle::*;
        match (self, next) {
            (Disposed, _) => false,
            (_, Disposed) => true,
            (Created, Loaded) | (Loaded, Published) => true,
            _ => false,
        }
    }

    /// Whether a node in this state may be handed to visitors.
    #[must_use]
    pub const fn is_visitable(self) -> bool {
        matches!(self, NodeLifecycle::Published | NodeLifecycle::Cached)
    }

    #[must_use]
    pub const fn is_disposed(self) -> bool {
        matches!(self, NodeLifecycle::Disposed)
    }
}

impl fmt::Display for NodeLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeLifecycle::Created => "created",
            NodeLifecycle::Loaded => "loaded",
            NodeLifecycle::Published => "published",
            NodeLifecycle::Cached => "cached",
            NodeLifecycle::Disposed => "disposed",
        };
        f.write_str(name)
    }
}
