//! Storage Module Tests
//!
//! Validates the local table mechanics.
//!
//! ## Test Scopes
//! - **Store**: Put/Get/Remove semantics, size limits, budget admission.
//! - **StoreSet**: Replica slot isolation and the bulk operations used by chain repair.

#[cfg(test)]
mod tests {
    use crate::budget::{SharedBudget, Unlimited};
    use crate::error::StoreError;
    use crate::storage::memory::{MAX_KEY_LEN, MAX_VALUE_LEN};
    use crate::storage::{ReplicaSlot, Store, StoreEntry, StoreSet, Table};
    use std::sync::Arc;

    fn unlimited() -> SharedBudget {
        Arc::new(Unlimited)
    }

    fn entry(key: &str, value: &str) -> StoreEntry {
        StoreEntry::new(key, value, 0)
    }

    // ============================================================
    // STORE TESTS
    // ============================================================

    #[test]
    fn test_put_then_get_at_size_limits() {
        let mut store = Store::new();
        let budget = unlimited();

        let key = vec![b'k'; MAX_KEY_LEN];
        let value = vec![b'v'; MAX_VALUE_LEN];
        store.put(&key, &value, Some(7), &budget).unwrap();

        assert_eq!(store.get(&key), Ok((value, 7)));
    }

    #[test]
    fn test_missing_version_defaults_to_zero() {
        let mut store = Store::new();
        store.put(b"a", b"1", None, &unlimited()).unwrap();

        assert_eq!(store.get(b"a"), Ok((b"1".to_vec(), 0)));
    }

    #[test]
    fn test_oversized_key_and_value_are_rejected() {
        let mut store = Store::new();
        let budget = unlimited();

        let long_key = vec![b'k'; MAX_KEY_LEN + 1];
        assert_eq!(
            store.put(&long_key, b"v", None, &budget),
            Err(StoreError::KeyTooLong(33))
        );

        let long_value = vec![b'v'; MAX_VALUE_LEN + 1];
        assert_eq!(
            store.put(b"k", &long_value, None, &budget),
            Err(StoreError::ValueTooLong(10_001))
        );

        assert!(store.is_empty(), "Rejected puts must not change the store");
    }

    #[test]
    fn test_size_limits_are_checked_before_budget() {
        let mut store = Store::new();
        let refuse: SharedBudget = Arc::new(|_: usize| false);

        let long_key = vec![b'k'; MAX_KEY_LEN + 1];
        assert_eq!(
            store.put(&long_key, b"v", None, &refuse),
            Err(StoreError::KeyTooLong(33))
        );
        assert_eq!(store.put(b"k", b"v", None, &refuse), Err(StoreError::NoSpace(6)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let mut store = Store::new();
        let budget = unlimited();

        store.put(b"a", b"1", Some(1), &budget).unwrap();
        store.put(b"a", b"2", Some(1), &budget).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(b"a"), Ok((b"2".to_vec(), 1)));
    }

    #[test]
    fn test_remove_absent_key() {
        let mut store = Store::new();
        assert_eq!(store.remove(b"ghost"), Err(StoreError::KeyNotFound));
        assert_eq!(store.get(b"ghost"), Err(StoreError::KeyNotFound));
    }

    #[test]
    fn test_remove_swaps_last_into_place() {
        let mut store = Store::from_entries(vec![entry("a", "1"), entry("b", "2"), entry("c", "3")]);

        store.remove(b"a").unwrap();

        assert_eq!(store.keys(), vec![b"c".to_vec(), b"b".to_vec()]);
        assert_eq!(store.remove(b"a"), Err(StoreError::KeyNotFound));
    }

    #[test]
    fn test_drain_where_removes_matches_once() {
        let mut store = Store::from_entries(vec![entry("x1", "1"), entry("y1", "2"), entry("x2", "3")]);

        let drained = store.drain_where(|k| k.starts_with(b"x"));

        assert_eq!(drained.len(), 2);
        assert_eq!(store.keys(), vec![b"y1".to_vec()]);
    }

    // ============================================================
    // STORE SET TESTS
    // ============================================================

    #[test]
    fn test_tables_are_isolated() {
        let stores = StoreSet::new(unlimited());

        stores.put(Table::Primary, b"a", b"p", None).unwrap();
        stores
            .put(Table::Replica(ReplicaSlot::Father), b"a", b"r0", None)
            .unwrap();

        assert_eq!(stores.get(Table::Primary, b"a").unwrap().0, b"p".to_vec());
        assert_eq!(
            stores.get(Table::Replica(ReplicaSlot::Father), b"a").unwrap().0,
            b"r0".to_vec()
        );
        assert_eq!(
            stores.get(Table::Replica(ReplicaSlot::Grandfather), b"a"),
            Err(StoreError::KeyNotFound)
        );
    }

    #[test]
    fn test_replica_slots_enforce_limits() {
        let stores = StoreSet::new(unlimited());
        let long_key = vec![b'k'; MAX_KEY_LEN + 1];

        assert_eq!(
            stores.put(Table::Replica(ReplicaSlot::Grandfather), &long_key, b"v", None),
            Err(StoreError::KeyTooLong(33))
        );
    }

    #[test]
    fn test_replace_is_not_a_merge() {
        let stores = StoreSet::new(unlimited());
        let slot = ReplicaSlot::Father;

        stores.replace(slot, vec![entry("old", "1")]);
        stores.replace(slot, vec![entry("new", "2")]);

        let keys: Vec<_> = stores
            .snapshot(Table::Replica(slot))
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec![b"new".to_vec()]);
    }

    #[test]
    fn test_shift_for_dead_father() {
        let stores = StoreSet::new(unlimited());
        stores.put(Table::Primary, b"mine", b"1", None).unwrap();
        stores.replace(ReplicaSlot::Father, vec![entry("father", "2")]);
        stores.replace(ReplicaSlot::Grandfather, vec![entry("grandfather", "3")]);

        let merged = stores.shift_for_dead_father(vec![entry("great", "4")]);

        assert_eq!(merged.len(), 2);
        assert!(stores.get(Table::Primary, b"father").is_ok());
        assert!(stores.get(Table::Primary, b"mine").is_ok());
        assert!(
            stores
                .get(Table::Replica(ReplicaSlot::Father), b"grandfather")
                .is_ok()
        );
        assert!(
            stores
                .get(Table::Replica(ReplicaSlot::Grandfather), b"great")
                .is_ok()
        );
        assert_eq!(stores.len(Table::Replica(ReplicaSlot::Father)), 1);
    }

    #[test]
    fn test_absorb_ignores_budget_and_upserts() {
        let refuse: SharedBudget = Arc::new(|_: usize| false);
        let stores = StoreSet::new(refuse);

        let primary = stores.absorb(vec![entry("a", "1"), entry("a", "2")]);

        assert_eq!(primary, vec![entry("a", "2")]);
    }
}
