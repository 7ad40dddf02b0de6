//! Property-based invariant tests for child-list reconciliation.
//!
//! 1. `removed`, `inserted` and `changed` partition the union of both lists
//!    by identity.
//! 2. Applying the emitted removal and insertion batches to the old list
//!    yields the new list.
//! 3. Moves are a subset of kept nodes, and an order-preserving reload
//!    moves nothing.

use std::collections::BTreeSet;

use arbor_model::diff;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn list_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::btree_set(0u8..32, 0..16)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn keys<T: Copy + Ord>(items: impl Iterator<Item = T>) -> BTreeSet<T> {
    items.collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Partition by identity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn diff_partitions_union(old in list_strategy(), new in list_strategy()) {
        let cs = diff(&old, &new, |n| *n);
        let old_set = keys(old.iter().copied());
        let new_set = keys(new.iter().copied());

        let removed = keys(cs.removed.iter().map(|r| r.node));
        let inserted = keys(cs.inserted.iter().map(|i| i.node));
        let changed = keys(cs.changed.iter().map(|c| c.node));

        prop_assert_eq!(&removed, &keys(old_set.difference(&new_set).copied()));
        prop_assert_eq!(&inserted, &keys(new_set.difference(&old_set).copied()));
        prop_assert_eq!(&changed, &keys(old_set.intersection(&new_set).copied()));
        prop_assert_eq!(removed.len() + inserted.len() + changed.len(), old_set.union(&new_set).count());

        for r in &cs.removed {
            prop_assert_eq!(old[r.index], r.node);
        }
        for i in cs.inserted.iter().chain(cs.changed.iter()) {
            prop_assert_eq!(new[i.index], i.node);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Events replay old into new
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn events_transform_old_into_new(old in list_strategy(), new in list_strategy()) {
        let cs = diff(&old, &new, |n| *n);
        let events = cs.events();

        let mut list = old.clone();
        events.apply_removals(&mut list);
        events.apply_insertions(&mut list);
        prop_assert_eq!(&list, &new);

        for pair in events.removed.windows(2) {
            prop_assert!(pair[0].index < pair[1].index);
        }
        for pair in events.inserted.windows(2) {
            prop_assert!(pair[0].index < pair[1].index);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Moves
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn moves_are_kept_nodes(old in list_strategy(), new in list_strategy()) {
        let cs = diff(&old, &new, |n| *n);
        let changed = keys(cs.changed.iter().map(|c| c.node));
        for m in &cs.moved {
            prop_assert!(changed.contains(&m.node));
            prop_assert_eq!(old[m.from], m.node);
            prop_assert_eq!(new[m.to], m.node);
        }
        let unmoved = cs.events().changed.len();
        prop_assert_eq!(unmoved + cs.moved.len(), cs.changed.len());
    }

    #[test]
    fn order_preserving_reload_moves_nothing(
        old in list_strategy(),
        keep in prop::collection::vec(any::<bool>(), 16),
    ) {
        let new: Vec<u8> = old
            .iter()
            .zip(keep.iter())
            .filter(|(_, k)| **k)
            .map(|(n, _)| *n)
            .collect();
        let cs = diff(&old, &new, |n| *n);
        prop_assert!(cs.moved.is_empty());
        prop_assert!(cs.inserted.is_empty());
    }
}
