//! Backing map trait definition.

use crate::error::StorageResult;

/// The mapping contract an overlay is layered on.
///
/// A backend is a plain mutable key-value container. It knows nothing about
/// transactions or locking: [`crate::LockedStore`] serializes every call, and
/// the transaction layer only mutates a backend from inside a single
/// exclusive-lock section at commit.
///
/// Every operation is fallible so that backends which observe, validate or
/// forward their mutations can report failures. In-memory implementations
/// for [`std::collections::HashMap`] and [`std::collections::BTreeMap`]
/// never fail.
///
/// # Invariants
///
/// - `get` returns the value last stored by `put` for that key, or `None`
///   after `remove`/`clear`
/// - `keys`, `values` and `entries` return owned snapshots
/// - Backends must be `Send + Sync` so the store can be shared across threads
pub trait MapBackend<K, V>: Send + Sync {
    /// Returns the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the lookup.
    fn get(&self, key: &K) -> StorageResult<Option<V>>;

    /// Returns true if a value is stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the lookup.
    fn contains_key(&self, key: &K) -> StorageResult<bool>;

    /// Returns true if any key maps to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the scan.
    fn contains_value(&self, value: &V) -> StorageResult<bool>;

    /// Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn len(&self) -> StorageResult<usize>;

    /// Returns true if the backend holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns a snapshot of all keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be scanned.
    fn keys(&self) -> StorageResult<Vec<K>>;

    /// Returns a snapshot of all values.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be scanned.
    fn values(&self) -> StorageResult<Vec<V>>;

    /// Returns a snapshot of all entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be scanned.
    fn entries(&self) -> StorageResult<Vec<(K, V)>>;

    /// Stores `value` under `key`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn put(&mut self, key: K, value: V) -> StorageResult<Option<V>>;

    /// Stores every entry, in iteration order.
    ///
    /// The default implementation issues one [`MapBackend::put`] per entry,
    /// so observing backends see each write individually.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failed `put`. Entries before it stay
    /// applied.
    fn put_all(&mut self, entries: Vec<(K, V)>) -> StorageResult<()> {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Removes `key`, returning the value it had.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the removal.
    fn remove(&mut self, key: &K) -> StorageResult<Option<V>>;

    /// Removes all entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the operation.
    fn clear(&mut self) -> StorageResult<()>;
}
