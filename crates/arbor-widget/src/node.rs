#![forbid(unsafe_code)]

//! Nodes as the widget sees them.
//!
//! A widget row is backed by one of three kinds of node:
//!
//! - **Live**: a published [`ViewNode`] of the view model.
//! - **Cached**: a node materialized from a snapshot, shown until the live
//!   root arrives.
//! - **Placeholder**: the transient "loading" child of a node whose children
//!   are still being computed.
//!
//! Every kind carries a [`NodeId`]; equality and hashing use it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arbor_core::{DomainNode, NodeId, NodeLifecycle, Presentation};
use arbor_model::ViewNode;

// ============================================================================
// Cached
// ============================================================================

#[derive(Debug)]
struct CachedInner {
    id: NodeId,
    key: String,
    presentation: Presentation,
    leaf: bool,
    disposed: AtomicBool,
}

/// Snapshot-backed node.
#[derive(Clone)]
pub struct CachedNode {
    inner: Arc<CachedInner>,
}

impl CachedNode {
    #[must_use]
    pub fn new(key: impl Into<String>, presentation: Presentation, leaf: bool) -> Self {
        Self {
            inner: Arc::new(CachedInner {
                id: NodeId::next(),
                key: key.into(),
                presentation,
                leaf,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Snapshot key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    #[must_use]
    pub fn presentation(&self) -> &Presentation {
        &self.inner.presentation
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.inner.leaf
    }

    #[must_use]
    pub fn lifecycle(&self) -> NodeLifecycle {
        if self.inner.disposed.load(Ordering::Acquire) {
            NodeLifecycle::Disposed
        } else {
            NodeLifecycle::Cached
        }
    }

    pub(crate) fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for CachedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedNode")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

// ============================================================================
// Placeholder
// ============================================================================

/// Transient child shown while real children load.
#[derive(Debug, Clone)]
pub struct PlaceholderNode {
    id: NodeId,
    parent: NodeId,
    text: Arc<str>,
}

impl PlaceholderNode {
    #[must_use]
    pub(crate) fn new(parent: NodeId, text: &str) -> Self {
        Self {
            id: NodeId::next(),
            parent,
            text: Arc::from(text),
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node whose children are loading.
    #[must_use]
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

// ============================================================================
// WidgetNode
// ============================================================================

/// A node exposed to the widget.
pub enum WidgetNode<N: DomainNode> {
    Live(ViewNode<N>),
    Cached(CachedNode),
    Placeholder(PlaceholderNode),
}

impl<N: DomainNode> Clone for WidgetNode<N> {
    fn clone(&self) -> Self {
        match self {
            Self::Live(node) => Self::Live(node.clone()),
            Self::Cached(node) => Self::Cached(node.clone()),
            Self::Placeholder(node) => Self::Placeholder(node.clone()),
        }
    }
}

impl<N: DomainNode> WidgetNode<N> {
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::Live(node) => node.id(),
            Self::Cached(node) => node.id(),
            Self::Placeholder(node) => node.id(),
        }
    }

    /// Row presentation. A live node without a presentation yet has none.
    #[must_use]
    pub fn presentation(&self) -> Option<Presentation> {
        match self {
            Self::Live(node) => node.presentation_now(),
            Self::Cached(node) => Some(node.presentation().clone()),
            Self::Placeholder(node) => Some(
                Presentation::builder(node.text())
                    .with_leaf(true)
                    .build(),
            ),
        }
    }

    /// Row text: main text and fragments, unstyled.
    #[must_use]
    pub fn label(&self) -> String {
        self.presentation()
            .map(|p| p.plain_text())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        match self {
            Self::Live(node) => node.presentation_now().is_some_and(|p| p.is_leaf()),
            Self::Cached(node) => node.is_leaf(),
            Self::Placeholder(_) => true,
        }
    }

    /// Lifecycle; placeholders report `Published` while shown.
    #[must_use]
    pub fn lifecycle(&self) -> NodeLifecycle {
        match self {
            Self::Live(node) => node.lifecycle(),
            Self::Cached(node) => node.lifecycle(),
            Self::Placeholder(_) => NodeLifecycle::Published,
        }
    }

    #[must_use]
    pub fn as_live(&self) -> Option<&ViewNode<N>> {
        match self {
            Self::Live(node) => Some(node),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

impl<N: DomainNode> From<ViewNode<N>> for WidgetNode<N> {
    fn from(node: ViewNode<N>) -> Self {
        Self::Live(node)
    }
}

impl<N: DomainNode> PartialEq for WidgetNode<N> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<N: DomainNode> Eq for WidgetNode<N> {}

impl<N: DomainNode> Hash for WidgetNode<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<N: DomainNode> fmt::Debug for WidgetNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live(node) => fmt::Debug::fmt(node, f),
            Self::Cached(node) => fmt::Debug::fmt(node, f),
            Self::Placeholder(node) => fmt::Debug::fmt(node, f),
        }
    }
}
