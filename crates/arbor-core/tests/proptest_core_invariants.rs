//! Property-based invariant tests for paths, latest-wins cells and scopes.
//!
//! 1. A path built from a sequence round-trips through `to_vec`.
//! 2. Every prefix of a path is an ancestor of it.
//! 3. A latest-wins cell never regresses to an older generation.
//! 4. Cancelling any scope in a chain cancels exactly that scope and its
//!    descendants.

use arbor_core::{Latest, Scope, TreePath};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn nodes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..24)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Path round-trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn path_round_trip(nodes in nodes_strategy()) {
        let path = TreePath::from_nodes(nodes.clone()).unwrap();
        prop_assert_eq!(path.len(), nodes.len());
        prop_assert_eq!(path.to_vec(), nodes.clone());
        prop_assert_eq!(*path.last(), *nodes.last().unwrap());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Prefixes are ancestors
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn prefixes_are_ancestors(nodes in nodes_strategy(), cut in any::<prop::sample::Index>()) {
        let path = TreePath::from_nodes(nodes.clone()).unwrap();
        let k = cut.index(nodes.len()) + 1;
        let prefix = TreePath::from_nodes(nodes[..k].to_vec()).unwrap();
        prop_assert!(path.is_descendant_of(&prefix));
        if k < nodes.len() {
            prop_assert!(!prefix.is_descendant_of(&path));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Latest-wins never regresses
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn latest_never_regresses(generations in prop::collection::vec(0u64..50, 1..64)) {
        let cell = Latest::new();
        let mut max_seen = None::<u64>;
        for generation in generations {
            let accepted = cell.publish(generation, generation);
            let expected = max_seen.is_none_or(|m| generation >= m);
            prop_assert_eq!(accepted, expected);
            if accepted {
                max_seen = Some(generation);
            }
            prop_assert_eq!(cell.current(), max_seen);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Cancellation cascades downward only
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cancel_in_chain(depth in 1usize..16, cut in any::<prop::sample::Index>()) {
        let mut chain = vec![Scope::root("root")];
        for i in 1..depth {
            let child = chain[i - 1].child(format!("level-{i}"));
            chain.push(child);
        }
        let k = cut.index(chain.len());
        chain[k].cancel();
        for (i, scope) in chain.iter().enumerate() {
            prop_assert_eq!(scope.is_cancelled(), i >= k);
        }
    }
}
