//! Backing maps that record or sabotage their mutations.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use txmap_storage::{MapBackend, StorageError, StorageResult};

/// A mutation call received by a [`RecordingMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapCall<K, V> {
    /// `put(key, value)`
    Put {
        /// Key written.
        key: K,
        /// Value written.
        value: V,
    },
    /// `remove(key)`
    Remove {
        /// Key removed.
        key: K,
    },
    /// `clear()`
    Clear,
}

impl<K, V> MapCall<K, V> {
    /// Returns the key the call touched, if any.
    pub fn key(&self) -> Option<&K> {
        match self {
            Self::Put { key, .. } | Self::Remove { key } => Some(key),
            Self::Clear => None,
        }
    }

    /// Returns true for `remove` calls.
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }

    /// Returns true for `put` calls.
    pub fn is_put(&self) -> bool {
        matches!(self, Self::Put { .. })
    }
}

/// Shared handle to the calls a [`RecordingMap`] received, oldest first.
///
/// The handle stays usable after the map has been moved into an overlay.
#[derive(Debug)]
pub struct CallLog<K, V> {
    calls: Arc<Mutex<VecDeque<MapCall<K, V>>>>,
}

impl<K, V> Clone for CallLog<K, V> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<K, V> CallLog<K, V> {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn push(&self, call: MapCall<K, V>) {
        self.calls.lock().push_back(call);
    }

    /// Removes and returns the oldest recorded call.
    pub fn pop_call(&self) -> Option<MapCall<K, V>> {
        self.calls.lock().pop_front()
    }

    /// Removes and returns every recorded call.
    pub fn drain(&self) -> Vec<MapCall<K, V>> {
        self.calls.lock().drain(..).collect()
    }

    /// Returns the number of recorded calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns true if no call is recorded.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

/// A `HashMap` backend that records every mutation call.
///
/// Bulk writes go through the trait's per-entry `put_all`, so each entry is
/// recorded as its own `put`.
#[derive(Debug)]
pub struct RecordingMap<K, V> {
    inner: HashMap<K, V>,
    log: CallLog<K, V>,
}

impl<K, V> RecordingMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty recording map.
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
            log: CallLog::new(),
        }
    }

    /// Creates a recording map holding `entries`. Seeding is not recorded.
    pub fn with_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            inner: entries.into_iter().collect(),
            log: CallLog::new(),
        }
    }

    /// Returns a handle to the call log.
    pub fn log(&self) -> CallLog<K, V> {
        self.log.clone()
    }
}

impl<K, V> Default for RecordingMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MapBackend<K, V> for RecordingMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    fn get(&self, key: &K) -> StorageResult<Option<V>> {
        Ok(self.inner.get(key).cloned())
    }

    fn contains_key(&self, key: &K) -> StorageResult<bool> {
        Ok(self.inner.contains_key(key))
    }

    fn contains_value(&self, value: &V) -> StorageResult<bool> {
        Ok(self.inner.values().any(|v| v == value))
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.inner.len())
    }

    fn keys(&self) -> StorageResult<Vec<K>> {
        Ok(self.inner.keys().cloned().collect())
    }

    fn values(&self) -> StorageResult<Vec<V>> {
        Ok(self.inner.values().cloned().collect())
    }

    fn entries(&self) -> StorageResult<Vec<(K, V)>> {
        Ok(self
            .inner
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put(&mut self, key: K, value: V) -> StorageResult<Option<V>> {
        self.log.push(MapCall::Put {
            key: key.clone(),
            value: value.clone(),
        });
        Ok(self.inner.insert(key, value))
    }

    fn remove(&mut self, key: &K) -> StorageResult<Option<V>> {
        self.log.push(MapCall::Remove { key: key.clone() });
        Ok(self.inner.remove(key))
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.log.push(MapCall::Clear);
        self.inner.clear();
        Ok(())
    }
}

/// A `HashMap` backend whose n-th mutation fails.
///
/// Mutations are counted from zero across `put`, `remove` and `clear`. The
/// failing call leaves the map unchanged; later calls succeed again.
#[derive(Debug)]
pub struct FailingMap<K, V> {
    inner: HashMap<K, V>,
    mutations: usize,
    fail_at: usize,
}

impl<K, V> FailingMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates a map whose mutation number `fail_at` (zero-based) fails.
    pub fn failing_at(fail_at: usize, entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            inner: entries.into_iter().collect(),
            mutations: 0,
            fail_at,
        }
    }

    fn check(&mut self, operation: &str) -> StorageResult<()> {
        let index = self.mutations;
        self.mutations += 1;
        if index == self.fail_at {
            return Err(StorageError::backend(format!(
                "injected failure on {operation} (mutation #{index})"
            )));
        }
        Ok(())
    }
}

impl<K, V> MapBackend<K, V> for FailingMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    fn get(&self, key: &K) -> StorageResult<Option<V>> {
        Ok(self.inner.get(key).cloned())
    }

    fn contains_key(&self, key: &K) -> StorageResult<bool> {
        Ok(self.inner.contains_key(key))
    }

    fn contains_value(&self, value: &V) -> StorageResult<bool> {
        Ok(self.inner.values().any(|v| v == value))
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.inner.len())
    }

    fn keys(&self) -> StorageResult<Vec<K>> {
        Ok(self.inner.keys().cloned().collect())
    }

    fn values(&self) -> StorageResult<Vec<V>> {
        Ok(self.inner.values().cloned().collect())
    }

    fn entries(&self) -> StorageResult<Vec<(K, V)>> {
        Ok(self
            .inner
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put(&mut self, key: K, value: V) -> StorageResult<Option<V>> {
        self.check("put")?;
        Ok(self.inner.insert(key, value))
    }

    fn remove(&mut self, key: &K) -> StorageResult<Option<V>> {
        self.check("remove")?;
        Ok(self.inner.remove(key))
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.check("clear")?;
        self.inner.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_map_logs_mutations_only() {
        let mut map = RecordingMap::with_entries([("a", 1)]);
        let log = map.log();

        map.get(&"a").unwrap();
        map.put("b", 2).unwrap();
        map.remove(&"a").unwrap();
        map.clear().unwrap();

        assert_eq!(log.pop_call(), Some(MapCall::Put { key: "b", value: 2 }));
        assert_eq!(log.pop_call(), Some(MapCall::Remove { key: "a" }));
        assert_eq!(log.pop_call(), Some(MapCall::Clear));
        assert_eq!(log.pop_call(), None);
    }

    #[test]
    fn recording_map_records_put_all_per_entry() {
        let mut map = RecordingMap::new();
        let log = map.log();

        map.put_all(vec![("a", 1), ("b", 2)]).unwrap();
        let calls = log.drain();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(MapCall::is_put));
    }

    #[test]
    fn failing_map_fails_selected_mutation() {
        let mut map = FailingMap::failing_at(1, [("a", 1)]);

        assert!(map.put("b", 2).is_ok());
        assert!(map.remove(&"a").is_err());
        assert_eq!(map.get(&"a").unwrap(), Some(1));
        assert!(map.clear().is_ok());
    }
}
