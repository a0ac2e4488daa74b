//! Storage Module Tests
//!
//! Validates version assignment and the stale-write rule of `VersionedStore`.
//!
//! *Note: replication between stores on different nodes is covered by the node tests.*

#[cfg(test)]
mod tests {
    use crate::storage::{Value, VersionedStore, WriteOutcome};

    // ============================================================
    // VERSION ASSIGNMENT TESTS
    // ============================================================

    #[test]
    fn test_first_version_is_zero() {
        let store = VersionedStore::new();
        let mut value = Value::unversioned("x");

        store.assign_version("a", &mut value);

        assert_eq!(value.version, Some(0));
    }

    #[test]
    fn test_next_version_follows_stored() {
        let mut store = VersionedStore::new();
        store.insert("a".to_string(), Value::versioned("old", 4));

        let mut value = Value::unversioned("new");
        store.assign_version("a", &mut value);

        assert_eq!(value.version, Some(5));
    }

    #[test]
    fn test_assigned_version_is_kept() {
        let mut store = VersionedStore::new();
        store.insert("a".to_string(), Value::versioned("old", 4));

        let mut value = Value::versioned("replayed", 2);
        store.assign_version("a", &mut value);

        assert_eq!(value.version, Some(2), "An assigned version is never rewritten");
    }

    // ============================================================
    // COMMIT TESTS
    // ============================================================

    #[test]
    fn test_commit_into_empty_store() {
        let mut store = VersionedStore::new();

        let outcome = store.commit("a", Value::versioned("x", 0));

        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(store.get("a"), Some(&Value::versioned("x", 0)));
    }

    #[test]
    fn test_newer_version_overwrites() {
        let mut store = VersionedStore::new();
        store.commit("a", Value::versioned("x", 0));

        let outcome = store.commit("a", Value::versioned("y", 1));

        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(store.get("a").unwrap().payload, "y");
    }

    #[test]
    fn test_equal_version_is_stale() {
        let mut store = VersionedStore::new();
        store.commit("a", Value::versioned("x", 3));

        let outcome = store.commit("a", Value::versioned("other", 3));

        assert_eq!(outcome, WriteOutcome::Stale);
        assert_eq!(store.get("a").unwrap().payload, "x", "Ties keep the existing value");
    }

    #[test]
    fn test_older_version_never_overwrites() {
        let mut store = VersionedStore::new();
        store.commit("a", Value::versioned("x", 7));

        for version in 0..7 {
            assert_eq!(
                store.commit("a", Value::versioned("old", version)),
                WriteOutcome::Stale
            );
        }
        assert_eq!(store.get("a").unwrap().version, Some(7));
    }

    #[test]
    fn test_repeated_commit_is_idempotent() {
        let mut store = VersionedStore::new();
        let value = Value::versioned("x", 2);

        assert_eq!(store.commit("a", value.clone()), WriteOutcome::Applied);
        for _ in 0..5 {
            assert_eq!(store.commit("a", value.clone()), WriteOutcome::Stale);
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a"), Some(&value));
    }

    #[test]
    fn test_drain_empties_store() {
        let mut store = VersionedStore::new();
        store.insert("a".to_string(), Value::versioned("x", 0));
        store.insert("b".to_string(), Value::versioned("y", 0));

        let mut drained: Vec<_> = store.drain().map(|(k, _)| k).collect();
        drained.sort();

        assert_eq!(drained, vec!["a", "b"]);
        assert!(store.is_empty());
    }
}
