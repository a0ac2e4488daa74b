//! Ring Module Tests
//!
//! ## Test Scopes
//! - **Ring keys**: fixed-length digests derived from `address:port`.
//! - **Positions**: deterministic, in range, identical across nodes sharing a view.
//! - **Successors**: wrap-around walk and the insufficient-cluster failure.

#[cfg(test)]
mod tests {
    use crate::node::protocol::Handle;
    use crate::ring::{Ring, RingError, RingKey, key_position};

    fn handles(count: usize) -> Vec<Handle> {
        (0..count)
            .map(|i| Handle::node(format!("127.0.0.1:{}", 7000 + i)))
            .collect()
    }

    fn ring_for(me: &Handle, all: &[Handle]) -> Ring {
        let mut ring = Ring::new(me.clone());
        ring.rebuild(all.iter().cloned());
        ring
    }

    // ============================================================
    // RING KEY TESTS
    // ============================================================

    #[test]
    fn test_ring_key_is_fixed_length_hex() {
        let key = RingKey::of("127.0.0.1:7000");
        assert_eq!(key.0.len(), 64);
        assert!(key.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ring_key_depends_only_on_identity() {
        assert_eq!(RingKey::of("10.0.0.1:25521"), RingKey::of("10.0.0.1:25521"));
        assert_ne!(RingKey::of("10.0.0.1:25521"), RingKey::of("10.0.0.1:25522"));
    }

    // ============================================================
    // VIEW TESTS
    // ============================================================

    #[test]
    fn test_new_ring_contains_only_self() {
        let me = Handle::node("127.0.0.1:7000");
        let ring = Ring::new(me.clone());

        assert_eq!(ring.len(), 1);
        assert_eq!(ring.self_position(), 0);
        assert_eq!(ring.nodes()[0].handle, me);
    }

    #[test]
    fn test_rebuild_sorts_and_keeps_self() {
        let all = handles(5);
        let me = all[3].clone();
        // Feed without self: the local node must still be present.
        let mut ring = Ring::new(me.clone());
        ring.rebuild(all.iter().filter(|h| *h != &me).cloned());

        assert_eq!(ring.len(), 5);
        let keys: Vec<_> = ring.nodes().iter().map(|n| n.ring_key.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "Ring must be sorted by ring key");
        assert_eq!(ring.nodes()[ring.self_position()].handle, me);
    }

    #[test]
    fn test_rebuild_collapses_duplicates() {
        let all = handles(3);
        let me = all[0].clone();
        let mut ring = Ring::new(me.clone());
        // The feed reports self and repeats a peer.
        ring.rebuild(vec![all[0].clone(), all[1].clone(), all[1].clone(), all[2].clone()]);

        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_rebuild_can_shrink() {
        let all = handles(4);
        let mut ring = ring_for(&all[0], &all);
        ring.rebuild(vec![all[1].clone()]);

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.nodes()[ring.self_position()].handle, all[0]);
    }

    // ============================================================
    // POSITION TESTS
    // ============================================================

    #[test]
    fn test_position_is_in_range() {
        for nodes in 1..10 {
            for i in 0..200 {
                let position = key_position(&format!("key_{}", i), nodes);
                assert!(position < nodes);
            }
        }
    }

    #[test]
    fn test_position_agrees_across_nodes() {
        let all = handles(6);
        let rings: Vec<Ring> = all.iter().map(|me| ring_for(me, &all)).collect();

        for i in 0..100 {
            let key = format!("book_{}", i);
            let first = rings[0].placement(&key, 2).unwrap();
            for ring in &rings[1..] {
                let other = ring.placement(&key, 2).unwrap();
                assert_eq!(other.position, first.position);
                assert_eq!(other.owner, first.owner);
                assert_eq!(other.successors, first.successors);
            }
        }
    }

    #[test]
    fn test_positions_spread_over_nodes() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..1000 {
            seen.insert(key_position(&format!("k{}", i), 8));
        }
        assert_eq!(seen.len(), 8, "1000 keys should touch every position");
    }

    // ============================================================
    // SUCCESSOR TESTS
    // ============================================================

    #[test]
    fn test_successors_wrap_around() {
        let all = handles(4);
        let ring = ring_for(&all[0], &all);

        let successors = ring.successors(3, 2).unwrap();
        assert_eq!(successors[0], ring.nodes()[0]);
        assert_eq!(successors[1], ring.nodes()[1]);

        let successors = ring.successors(1, 2).unwrap();
        assert_eq!(successors[0], ring.nodes()[2]);
        assert_eq!(successors[1], ring.nodes()[3]);
    }

    #[test]
    fn test_successors_exclude_owner() {
        let all = handles(3);
        let ring = ring_for(&all[0], &all);

        for position in 0..3 {
            let owner = ring.nodes()[position].clone();
            let successors = ring.successors(position, 2).unwrap();
            assert_eq!(successors.len(), 2);
            assert!(!successors.contains(&owner));
            assert_ne!(successors[0], successors[1]);
        }
    }

    #[test]
    fn test_insufficient_cluster_size() {
        let all = handles(2);
        let ring = ring_for(&all[0], &all);

        let err = ring.successors(0, 2).unwrap_err();
        assert_eq!(
            err,
            RingError::InsufficientClusterSize {
                required: 3,
                known: 2
            }
        );
        assert!(ring.placement("a", 2).is_err());
        assert!(!ring.can_replicate(2));
        assert!(ring.can_replicate(1));
    }

    #[test]
    fn test_zero_replicas_on_single_node() {
        let me = Handle::node("127.0.0.1:7000");
        let ring = Ring::new(me.clone());

        let placement = ring.placement("anything", 0).unwrap();
        assert_eq!(placement.owner.handle, me);
        assert!(placement.successors.is_empty());
    }
}
