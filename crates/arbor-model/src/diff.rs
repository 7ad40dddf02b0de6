#![forbid(unsafe_code)]

//! Child-list reconciliation.
//!
//! [`diff`] compares an old and a new ordered child list by identity key and
//! produces a [`ChangeSet`]:
//!
//! - `removed`: keys in old but not in new (old indices),
//! - `inserted`: keys in new but not in old (new indices),
//! - `changed`: keys in both (new indices),
//! - `moved`: the subset of `changed` whose relative order differs.
//!
//! Moves are computed against a longest increasing subsequence of old
//! positions, so the number of nodes reported as moved is minimal. A
//! widget applying a change set sees a moved node as removed at its old
//! index and inserted at its new one ([`ChangeSet::events`]).

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use arbor_core::DomainNode;

use crate::view_node::ViewNode;

/// A node at a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexed<T> {
    pub index: usize,
    pub node: T,
}

/// A kept node whose position changed relative to its kept siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moved<T> {
    pub from: usize,
    pub to: usize,
    pub node: T,
}

/// Reconciliation of one children recompute.
#[derive(Debug, Clone)]
pub struct ChangeSet<T> {
    /// Old list, as the consumer should currently hold it.
    pub previous: Vec<T>,
    /// New list, in order.
    pub children: Vec<T>,
    pub removed: Vec<Indexed<T>>,
    pub inserted: Vec<Indexed<T>>,
    pub changed: Vec<Indexed<T>>,
    pub moved: Vec<Moved<T>>,
    /// First children arrival for the parent.
    pub initial: bool,
}

/// Removal/insertion/change batches in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEvents<T> {
    /// Ascending old indices; remove back to front.
    pub removed: Vec<Indexed<T>>,
    /// Ascending new indices; insert front to back.
    pub inserted: Vec<Indexed<T>>,
    /// Ascending new indices of kept nodes that did not move.
    pub changed: Vec<Indexed<T>>,
}

impl<T: Clone> ChangeSet<T> {
    /// Change set announcing `children` as a first arrival.
    #[must_use]
    pub fn initial(children: Vec<T>) -> Self {
        let inserted = children
            .iter()
            .enumerate()
            .map(|(index, node)| Indexed {
                index,
                node: node.clone(),
            })
            .collect();
        Self {
            previous: Vec::new(),
            children,
            removed: Vec::new(),
            inserted,
            changed: Vec::new(),
            moved: Vec::new(),
            initial: true,
        }
    }

    /// Mark as a first arrival.
    #[must_use]
    pub fn with_initial(mut self, initial: bool) -> Self {
        self.initial = initial;
        self
    }

    /// Whether the change set alters structure (not only presentations).
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.initial || !self.removed.is_empty() || !self.inserted.is_empty() || !self.moved.is_empty()
    }

    /// Batches a consumer applies in order: removals, insertions, changes.
    #[must_use]
    pub fn events(&self) -> DiffEvents<T> {
        let moved_to: HashSet<usize> = self.moved.iter().map(|m| m.to).collect();

        let mut removed = self.removed.clone();
        removed.extend(self.moved.iter().map(|m| Indexed {
            index: m.from,
            node: m.node.clone(),
        }));
        removed.sort_by_key(|r| r.index);

        let mut inserted = self.inserted.clone();
        inserted.extend(self.moved.iter().map(|m| Indexed {
            index: m.to,
            node: m.node.clone(),
        }));
        inserted.sort_by_key(|i| i.index);

        let changed = self
            .changed
            .iter()
            .filter(|c| !moved_to.contains(&c.index))
            .cloned()
            .collect();

        DiffEvents {
            removed,
            inserted,
            changed,
        }
    }
}

impl<T: Clone> DiffEvents<T> {
    /// Remove `self.removed` from `list` (back to front).
    pub fn apply_removals(&self, list: &mut Vec<T>) {
        for removal in self.removed.iter().rev() {
            if removal.index < list.len() {
                list.remove(removal.index);
            }
        }
    }

    /// Insert `self.inserted` into `list` (front to back).
    pub fn apply_insertions(&self, list: &mut Vec<T>) {
        for insertion in &self.inserted {
            let at = insertion.index.min(list.len());
            list.insert(at, insertion.node.clone());
        }
    }
}

/// Reconcile `old` against `new` by `key`.
///
/// Keys must be unique within each list; later duplicates in `new` are
/// dropped.
pub fn diff<T, K>(old: &[T], new: &[T], key: impl Fn(&T) -> K) -> ChangeSet<T>
where
    T: Clone,
    K: Eq + Hash,
{
    let old_index: HashMap<K, usize> = old
        .iter()
        .enumerate()
        .map(|(i, node)| (key(node), i))
        .collect();

    let mut seen = HashSet::with_capacity(new.len());
    let mut children = Vec::with_capacity(new.len());
    for node in new {
        if seen.insert(key(node)) {
            children.push(node.clone());
        }
    }

    let mut inserted = Vec::new();
    let mut changed = Vec::new();
    let mut kept_old_positions = Vec::new();
    let mut kept_new_positions = Vec::new();
    for (index, node) in children.iter().enumerate() {
        match old_index.get(&key(node)) {
            Some(&from) => {
                changed.push(Indexed {
                    index,
                    node: node.clone(),
                });
                kept_old_positions.push(from);
                kept_new_positions.push(index);
            }
            None => inserted.push(Indexed {
                index,
                node: node.clone(),
            }),
        }
    }

    let removed = old
        .iter()
        .enumerate()
        .filter(|(_, node)| !seen.contains(&key(node)))
        .map(|(index, node)| Indexed {
            index,
            node: node.clone(),
        })
        .collect();

    let stable = longest_increasing_subsequence(&kept_old_positions);
    let mut moved = Vec::new();
    let mut stable_iter = stable.iter().peekable();
    for (k, (&from, &to)) in kept_old_positions
        .iter()
        .zip(kept_new_positions.iter())
        .enumerate()
    {
        if stable_iter.peek() == Some(&&k) {
            stable_iter.next();
            continue;
        }
        moved.push(Moved {
            from,
            to,
            node: children[to].clone(),
        });
    }

    ChangeSet {
        previous: old.to_vec(),
        children,
        removed,
        inserted,
        changed,
        moved,
        initial: false,
    }
}

/// Reconcile two child lists of view nodes by node identity.
pub fn reconcile<N: DomainNode>(
    old: &[ViewNode<N>],
    new: &[ViewNode<N>],
) -> ChangeSet<ViewNode<N>> {
    diff(old, new, ViewNode::id)
}

/// Positions (into `seq`) of one longest strictly increasing subsequence.
fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[len] = position of the smallest tail of an increasing run of
    // length len + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let slot = tails.partition_point(|&t| seq[t] < value);
        if slot > 0 {
            prev[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }
    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = prev[i];
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[Indexed<char>]) -> Vec<(usize, char)> {
        list.iter().map(|i| (i.index, i.node)).collect()
    }

    #[test]
    fn replace_one_keeps_other() {
        let cs = diff(&['A', 'B'], &['B', 'C'], |c| *c);
        assert_eq!(ids(&cs.removed), vec![(0, 'A')]);
        assert_eq!(ids(&cs.inserted), vec![(1, 'C')]);
        assert_eq!(ids(&cs.changed), vec![(0, 'B')]);
        assert!(cs.moved.is_empty());
    }

    #[test]
    fn swap_reports_one_move() {
        let cs = diff(&['A', 'B'], &['B', 'A'], |c| *c);
        assert!(cs.removed.is_empty());
        assert!(cs.inserted.is_empty());
        assert_eq!(cs.moved.len(), 1);
        let events = cs.events();
        let mut list = vec!['A', 'B'];
        events.apply_removals(&mut list);
        events.apply_insertions(&mut list);
        assert_eq!(list, vec!['B', 'A']);
        assert_eq!(events.changed.len(), 1);
    }

    #[test]
    fn rotate_moves_single_node() {
        let cs = diff(&['A', 'B', 'C', 'D'], &['D', 'A', 'B', 'C'], |c| *c);
        assert_eq!(cs.moved.len(), 1);
        assert_eq!(cs.moved[0].node, 'D');
        assert_eq!((cs.moved[0].from, cs.moved[0].to), (3, 0));
    }

    #[test]
    fn duplicate_keys_keep_first() {
        let cs = diff(&[], &['A', 'B', 'A'], |c| *c);
        assert_eq!(cs.children, vec!['A', 'B']);
        assert_eq!(cs.inserted.len(), 2);
    }

    #[test]
    fn initial_change_set() {
        let cs = ChangeSet::initial(vec!['x', 'y']);
        assert!(cs.initial);
        assert!(cs.is_structural());
        assert_eq!(ids(&cs.inserted), vec![(0, 'x'), (1, 'y')]);
    }

    #[test]
    fn unchanged_list_is_not_structural() {
        let cs = diff(&['A', 'B'], &['A', 'B'], |c| *c);
        assert!(!cs.is_structural());
        assert_eq!(cs.events().changed.len(), 2);
    }

    #[test]
    fn lis_is_increasing_and_maximal() {
        let seq = [3, 1, 4, 1, 5, 9, 2, 6];
        let lis = longest_increasing_subsequence(&seq);
        assert_eq!(lis.len(), 4);
        for pair in lis.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(seq[pair[0]] < seq[pair[1]]);
        }
    }
}
