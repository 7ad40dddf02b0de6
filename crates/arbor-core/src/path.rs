#![forbid(unsafe_code)]

//! Persistent root-to-node paths.
//!
//! A [`TreePath`] shares its parent prefix with every path derived from it, so
//! extending a path during a depth-first walk costs one allocation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

struct Segment<T> {
    node: T,
    parent: Option<Arc<Segment<T>>>,
    len: usize,
}

/// Ordered sequence of nodes from the root to a given node.
pub struct TreePath<T> {
    last: Arc<Segment<T>>,
}

impl<T> Clone for TreePath<T> {
    fn clone(&self) -> Self {
        Self {
            last: Arc::clone(&self.last),
        }
    }
}

impl<T> TreePath<T> {
    /// Single-element path.
    #[must_use]
    pub fn root(node: T) -> Self {
        Self {
            last: Arc::new(Segment {
                node,
                parent: None,
                len: 1,
            }),
        }
    }

    /// Path extended by `node`.
    #[must_use]
    pub fn child(&self, node: T) -> Self {
        Self {
            last: Arc::new(Segment {
                node,
                parent: Some(Arc::clone(&self.last)),
                len: self.last.len + 1,
            }),
        }
    }

    #[must_use]
    pub fn last(&self) -> &T {
        &self.last.node
    }

    /// Path without its last element, `None` for a root path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.last.parent.as_ref().map(|parent| Self {
            last: Arc::clone(parent),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.last.len
    }

    /// Always false; paths hold at least one node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Nodes from root to leaf.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        let mut nodes = Vec::with_capacity(self.len());
        let mut cursor = Some(&self.last);
        while let Some(segment) = cursor {
            nodes.push(&segment.node);
            cursor = segment.parent.as_ref();
        }
        nodes.reverse();
        nodes.into_iter()
    }

    /// Map every element, preserving order.
    #[must_use]
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> TreePath<U> {
        let mut nodes = self.iter();
        // A path is never empty.
        let first = f(nodes.next().unwrap_or_else(|| self.last()));
        let mut path = TreePath::root(first);
        for node in nodes {
            path = path.child(f(node));
        }
        path
    }
}

impl<T: PartialEq> TreePath<T> {
    /// Whether `ancestor` is a (non-strict) prefix of `self`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &TreePath<T>) -> bool {
        if ancestor.len() > self.len() {
            return false;
        }
        let mut cursor = Some(&self.last);
        while let Some(segment) = cursor {
            if segment.len == ancestor.len() {
                return TreePath::from_segment(segment) == *ancestor;
            }
            cursor = segment.parent.as_ref();
        }
        false
    }

    fn from_segment(segment: &Arc<Segment<T>>) -> Self {
        Self {
            last: Arc::clone(segment),
        }
    }
}

impl<T: Clone> TreePath<T> {
    /// Owned copy of the nodes from root to leaf.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Build a path from a non-empty sequence.
    pub fn from_nodes(nodes: impl IntoIterator<Item = T>) -> Option<Self> {
        let mut iter = nodes.into_iter();
        let mut path = TreePath::root(iter.next()?);
        for node in iter {
            path = path.child(node);
        }
        Some(path)
    }
}

impl<T: PartialEq> PartialEq for TreePath<T> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.last, &other.last) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        let mut a = Some(&self.last);
        let mut b = Some(&other.last);
        while let (Some(x), Some(y)) = (a, b) {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            if x.node != y.node {
                return false;
            }
            a = x.parent.as_ref();
            b = y.parent.as_ref();
        }
        true
    }
}

impl<T: Eq> Eq for TreePath<T> {}

impl<T: Hash> Hash for TreePath<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for node in self.iter() {
            node.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TreePath<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
