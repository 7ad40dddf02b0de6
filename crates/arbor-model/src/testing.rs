#![forbid(unsafe_code)]

//! In-memory domain model for tests, benches and demos.
//!
//! [`MemoryDomain`] holds a mutable tree of string nodes. Edits take effect
//! on the next domain call; pair them with `invalidate` to see them in a
//! view model. Faults and latency can be injected per node.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use arbor_core::{DomainError, DomainModel, Presentation};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct State {
    root: Option<String>,
    children: HashMap<String, Vec<String>>,
    leaves: HashSet<String>,
    presentations: HashMap<String, Vec<Presentation>>,
    failing_root: bool,
    failing_children: HashSet<String>,
    failing_presentations: HashSet<String>,
    delay: Option<Duration>,
    children_calls: HashMap<String, usize>,
    presentation_calls: HashMap<String, usize>,
}

/// Mutable in-memory tree of `String` nodes.
///
/// A node presents as its own name unless presentation steps were set.
#[derive(Debug, Default)]
pub struct MemoryDomain {
    state: Mutex<State>,
}

impl MemoryDomain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree rooted at `root` with the given `(parent, children)` edges.
    /// Nodes without an edge entry are leaves.
    #[must_use]
    pub fn from_edges(root: &str, edges: &[(&str, &[&str])]) -> Self {
        let domain = Self::new();
        domain.set_root(Some(root));
        let mut all: HashSet<String> = HashSet::from([root.to_string()]);
        let mut parents = HashSet::new();
        for (parent, children) in edges {
            domain.set_children(parent, children);
            parents.insert((*parent).to_string());
            all.insert((*parent).to_string());
            all.extend(children.iter().map(|c| (*c).to_string()));
        }
        let mut state = domain.state.lock();
        state.leaves = all.difference(&parents).cloned().collect();
        drop(state);
        domain
    }

    pub fn set_root(&self, root: Option<&str>) {
        self.state.lock().root = root.map(str::to_string);
    }

    pub fn set_children(&self, parent: &str, children: &[&str]) {
        let mut state = self.state.lock();
        state.leaves.remove(parent);
        state
            .children
            .insert(parent.to_string(), children.iter().map(|c| (*c).to_string()).collect());
    }

    pub fn set_leaf(&self, node: &str, leaf: bool) {
        let mut state = self.state.lock();
        if leaf {
            state.leaves.insert(node.to_string());
        } else {
            state.leaves.remove(node);
        }
    }

    /// Presentation snapshots streamed for `node`, best last.
    pub fn set_presentation_steps(&self, node: &str, steps: Vec<Presentation>) {
        self.state.lock().presentations.insert(node.to_string(), steps);
    }

    pub fn set_presentation(&self, node: &str, presentation: Presentation) {
        self.set_presentation_steps(node, vec![presentation]);
    }

    pub fn fail_root(&self, failing: bool) {
        self.state.lock().failing_root = failing;
    }

    pub fn fail_children(&self, node: &str, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing_children.insert(node.to_string());
        } else {
            state.failing_children.remove(node);
        }
    }

    pub fn fail_presentation(&self, node: &str, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing_presentations.insert(node.to_string());
        } else {
            state.failing_presentations.remove(node);
        }
    }

    /// Latency added before each children result and each presentation
    /// snapshot.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    #[must_use]
    pub fn children_calls(&self, node: &str) -> usize {
        self.state.lock().children_calls.get(node).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn presentation_calls(&self, node: &str) -> usize {
        self.state.lock().presentation_calls.get(node).copied().unwrap_or(0)
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

impl DomainModel for MemoryDomain {
    type Node = String;

    fn root(&self) -> BoxFuture<'static, Result<Option<String>, DomainError>> {
        let state = self.state.lock();
        let result = if state.failing_root {
            Err(DomainError::new("root unavailable"))
        } else {
            Ok(state.root.clone())
        };
        let delay = state.delay;
        Box::pin(async move {
            pause(delay).await;
            result
        })
    }

    fn children(&self, node: &String) -> BoxFuture<'static, Result<Vec<String>, DomainError>> {
        let mut state = self.state.lock();
        *state.children_calls.entry(node.clone()).or_default() += 1;
        let result = if state.failing_children.contains(node) {
            Err(DomainError::new(format!("children of {node} unavailable")))
        } else {
            Ok(state.children.get(node).cloned().unwrap_or_default())
        };
        let delay = state.delay;
        Box::pin(async move {
            pause(delay).await;
            result
        })
    }

    fn is_leaf(&self, node: &String) -> BoxFuture<'static, Result<bool, DomainError>> {
        let leaf = self.state.lock().leaves.contains(node);
        Box::pin(async move { Ok(leaf) })
    }

    fn presentation(&self, node: &String) -> BoxStream<'static, Result<Presentation, DomainError>> {
        let mut state = self.state.lock();
        *state.presentation_calls.entry(node.clone()).or_default() += 1;
        let delay = state.delay;
        if state.failing_presentations.contains(node) {
            let message = format!("presentation of {node} unavailable");
            return stream::once(async move {
                pause(delay).await;
                Err(DomainError::new(message))
            })
            .boxed();
        }
        let steps = state
            .presentations
            .get(node)
            .cloned()
            .unwrap_or_else(|| vec![Presentation::text(node.clone())]);
        stream::iter(steps)
            .then(move |p| async move {
                pause(delay).await;
                Ok(p)
            })
            .boxed()
    }
}
