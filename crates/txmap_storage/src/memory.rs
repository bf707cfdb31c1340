//! In-memory backing maps.
//!
//! The standard library maps are usable as backends directly, so an overlay
//! can be layered on a plain `HashMap` or `BTreeMap` without a wrapper type.

use crate::backend::MapBackend;
use crate::error::StorageResult;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

impl<K, V, S> MapBackend<K, V> for HashMap<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
    S: BuildHasher + Send + Sync,
{
    fn get(&self, key: &K) -> StorageResult<Option<V>> {
        Ok(HashMap::get(self, key).cloned())
    }

    fn contains_key(&self, key: &K) -> StorageResult<bool> {
        Ok(HashMap::contains_key(self, key))
    }

    fn contains_value(&self, value: &V) -> StorageResult<bool> {
        Ok(HashMap::values(self).any(|v| v == value))
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(HashMap::len(self))
    }

    fn keys(&self) -> StorageResult<Vec<K>> {
        Ok(HashMap::keys(self).cloned().collect())
    }

    fn values(&self) -> StorageResult<Vec<V>> {
        Ok(HashMap::values(self).cloned().collect())
    }

    fn entries(&self) -> StorageResult<Vec<(K, V)>> {
        Ok(self.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn put(&mut self, key: K, value: V) -> StorageResult<Option<V>> {
        Ok(self.insert(key, value))
    }

    fn put_all(&mut self, entries: Vec<(K, V)>) -> StorageResult<()> {
        self.extend(entries);
        Ok(())
    }

    fn remove(&mut self, key: &K) -> StorageResult<Option<V>> {
        Ok(HashMap::remove(self, key))
    }

    fn clear(&mut self) -> StorageResult<()> {
        HashMap::clear(self);
        Ok(())
    }
}

impl<K, V> MapBackend<K, V> for BTreeMap<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    fn get(&self, key: &K) -> StorageResult<Option<V>> {
        Ok(BTreeMap::get(self, key).cloned())
    }

    fn contains_key(&self, key: &K) -> StorageResult<bool> {
        Ok(BTreeMap::contains_key(self, key))
    }

    fn contains_value(&self, value: &V) -> StorageResult<bool> {
        Ok(BTreeMap::values(self).any(|v| v == value))
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(BTreeMap::len(self))
    }

    fn keys(&self) -> StorageResult<Vec<K>> {
        Ok(BTreeMap::keys(self).cloned().collect())
    }

    fn values(&self) -> StorageResult<Vec<V>> {
        Ok(BTreeMap::values(self).cloned().collect())
    }

    fn entries(&self) -> StorageResult<Vec<(K, V)>> {
        Ok(self.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn put(&mut self, key: K, value: V) -> StorageResult<Option<V>> {
        Ok(self.insert(key, value))
    }

    fn put_all(&mut self, entries: Vec<(K, V)>) -> StorageResult<()> {
        self.extend(entries);
        Ok(())
    }

    fn remove(&mut self, key: &K) -> StorageResult<Option<V>> {
        Ok(BTreeMap::remove(self, key))
    }

    fn clear(&mut self) -> StorageResult<()> {
        BTreeMap::clear(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HashMap<String, u32> {
        HashMap::new()
    }

    #[test]
    fn hash_map_put_returns_previous() {
        let mut map = backend();
        assert_eq!(MapBackend::put(&mut map, "a".into(), 1).unwrap(), None);
        assert_eq!(MapBackend::put(&mut map, "a".into(), 2).unwrap(), Some(1));
        assert_eq!(MapBackend::get(&map, &"a".to_string()).unwrap(), Some(2));
    }

    #[test]
    fn hash_map_remove_and_contains() {
        let mut map = backend();
        MapBackend::put(&mut map, "a".into(), 1).unwrap();

        assert!(MapBackend::contains_key(&map, &"a".to_string()).unwrap());
        assert!(MapBackend::contains_value(&map, &1).unwrap());

        assert_eq!(MapBackend::remove(&mut map, &"a".to_string()).unwrap(), Some(1));
        assert!(!MapBackend::contains_key(&map, &"a".to_string()).unwrap());
        assert!(MapBackend::is_empty(&map).unwrap());
    }

    #[test]
    fn hash_map_snapshots() {
        let mut map = backend();
        MapBackend::put_all(&mut map, vec![("a".into(), 1), ("b".into(), 2)]).unwrap();

        let mut keys = MapBackend::keys(&map).unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        let mut values = MapBackend::values(&map).unwrap();
        values.sort();
        assert_eq!(values, vec![1, 2]);

        assert_eq!(MapBackend::entries(&map).unwrap().len(), 2);
    }

    #[test]
    fn hash_map_clear() {
        let mut map = backend();
        MapBackend::put(&mut map, "a".into(), 1).unwrap();
        MapBackend::clear(&mut map).unwrap();
        assert_eq!(MapBackend::len(&map).unwrap(), 0);
    }

    #[test]
    fn btree_map_entries_are_ordered() {
        let mut map = BTreeMap::new();
        MapBackend::put(&mut map, 3u8, "c").unwrap();
        MapBackend::put(&mut map, 1u8, "a").unwrap();
        MapBackend::put(&mut map, 2u8, "b").unwrap();

        assert_eq!(
            MapBackend::entries(&map).unwrap(),
            vec![(1, "a"), (2, "b"), (3, "c")]
        );
        assert_eq!(MapBackend::remove(&mut map, &2).unwrap(), Some("b"));
        assert_eq!(MapBackend::len(&map).unwrap(), 2);
    }

    mod backends_agree {
        use crate::LockedStore;
        use std::collections::{BTreeMap, HashMap};
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Put(u8, u16),
            Remove(u8),
            Clear,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (0..16u8, any::<u16>()).prop_map(|(k, v)| Op::Put(k, v)),
                3 => (0..16u8).prop_map(Op::Remove),
                1 => Just(Op::Clear),
            ]
        }

        fn sorted(store: &LockedStore<u8, u16>) -> Vec<(u8, u16)> {
            let mut entries = store.entries().unwrap();
            entries.sort_unstable();
            entries
        }

        proptest! {
            #[test]
            fn hash_and_btree_backends_agree(ops in prop::collection::vec(op_strategy(), 1..64)) {
                let hashed = LockedStore::new(HashMap::<u8, u16>::new());
                let ordered = LockedStore::new(BTreeMap::<u8, u16>::new());

                for op in &ops {
                    match *op {
                        Op::Put(k, v) => {
                            prop_assert_eq!(hashed.put(k, v).unwrap(), ordered.put(k, v).unwrap());
                        }
                        Op::Remove(k) => {
                            prop_assert_eq!(hashed.remove(&k).unwrap(), ordered.remove(&k).unwrap());
                        }
                        Op::Clear => {
                            hashed.clear().unwrap();
                            ordered.clear().unwrap();
                        }
                    }
                    prop_assert_eq!(hashed.len().unwrap(), ordered.len().unwrap());
                }

                prop_assert_eq!(sorted(&hashed), sorted(&ordered));
                prop_assert_eq!(sorted(&ordered), ordered.entries().unwrap());
            }
        }
    }
}
