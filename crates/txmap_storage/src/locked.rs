//! Reader-writer locked store.

use crate::backend::MapBackend;
use crate::error::StorageResult;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// A backing map guarded by a reader-writer lock.
///
/// Every access to the wrapped backend goes through the lock: reads take it
/// shared, writes take it exclusive. View-returning reads hand back owned
/// snapshots, so iterating them never re-locks.
///
/// Batches of writes that must become visible together use [`LockedStore::write`],
/// which holds the exclusive lock until the returned guard is dropped. A
/// reader taking the shared lock observes either none or all of a batch.
///
/// # Thread Safety
///
/// The store is `Send + Sync` and is meant to be shared behind an `Arc`.
/// The lock is not reentrant: do not call store methods while holding a
/// guard from the same store on the same thread.
pub struct LockedStore<K, V> {
    backend: RwLock<Box<dyn MapBackend<K, V>>>,
    shared_acquisitions: AtomicU64,
    exclusive_acquisitions: AtomicU64,
}

/// Snapshot of how often a store's lock was taken in each mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Number of shared (read) acquisitions.
    pub shared: u64,
    /// Number of exclusive (write) acquisitions.
    pub exclusive: u64,
}

impl<K, V> LockedStore<K, V> {
    /// Wraps a backend.
    pub fn new<B>(backend: B) -> Self
    where
        B: MapBackend<K, V> + 'static,
    {
        Self::from_boxed(Box::new(backend))
    }

    /// Wraps an already boxed backend.
    #[must_use]
    pub fn from_boxed(backend: Box<dyn MapBackend<K, V>>) -> Self {
        Self {
            backend: RwLock::new(backend),
            shared_acquisitions: AtomicU64::new(0),
            exclusive_acquisitions: AtomicU64::new(0),
        }
    }

    /// Takes the shared lock for a sequence of consistent reads.
    pub fn read(&self) -> StoreReadGuard<'_, K, V> {
        let guard = self.backend.read();
        self.shared_acquisitions.fetch_add(1, Ordering::Relaxed);
        StoreReadGuard { guard }
    }

    /// Takes the exclusive lock for a batch of writes.
    ///
    /// The lock is released when the guard is dropped, including when a
    /// backend call inside the batch fails and the error is propagated.
    pub fn write(&self) -> StoreWriteGuard<'_, K, V> {
        let guard = self.backend.write();
        self.exclusive_acquisitions.fetch_add(1, Ordering::Relaxed);
        StoreWriteGuard { guard }
    }

    /// Returns how often the lock has been taken so far.
    #[must_use]
    pub fn lock_stats(&self) -> LockStats {
        LockStats {
            shared: self.shared_acquisitions.load(Ordering::Relaxed),
            exclusive: self.exclusive_acquisitions.load(Ordering::Relaxed),
        }
    }

    /// Returns the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn get(&self, key: &K) -> StorageResult<Option<V>> {
        self.read().get(key)
    }

    /// Returns true if a value is stored for `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn contains_key(&self, key: &K) -> StorageResult<bool> {
        self.read().contains_key(key)
    }

    /// Returns true if any key maps to `value`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn contains_value(&self, value: &V) -> StorageResult<bool> {
        self.read().contains_value(value)
    }

    /// Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn len(&self) -> StorageResult<usize> {
        self.read().len()
    }

    /// Returns true if the store holds no entries.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn is_empty(&self) -> StorageResult<bool> {
        self.read().is_empty()
    }

    /// Returns a snapshot of all keys.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn keys(&self) -> StorageResult<Vec<K>> {
        self.read().keys()
    }

    /// Returns a snapshot of all values.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn values(&self) -> StorageResult<Vec<V>> {
        self.read().values()
    }

    /// Returns a snapshot of all entries.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn entries(&self) -> StorageResult<Vec<(K, V)>> {
        self.read().entries()
    }

    /// Stores `value` under `key`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn put(&self, key: K, value: V) -> StorageResult<Option<V>> {
        self.write().put(key, value)
    }

    /// Stores every entry under a single exclusive acquisition.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn put_all(&self, entries: Vec<(K, V)>) -> StorageResult<()> {
        self.write().put_all(entries)
    }

    /// Removes `key`, returning the value it had.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn remove(&self, key: &K) -> StorageResult<Option<V>> {
        self.write().remove(key)
    }

    /// Removes all entries.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn clear(&self) -> StorageResult<()> {
        self.write().clear()
    }
}

impl<K, V> fmt::Debug for LockedStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedStore")
            .field("lock_stats", &self.lock_stats())
            .finish_non_exhaustive()
    }
}

/// Shared access to a [`LockedStore`]'s backend.
///
/// Dereferences to the backend; every read made through one guard sees the
/// same committed state.
pub struct StoreReadGuard<'a, K, V> {
    guard: RwLockReadGuard<'a, Box<dyn MapBackend<K, V>>>,
}

impl<K, V> Deref for StoreReadGuard<'_, K, V> {
    type Target = dyn MapBackend<K, V>;

    fn deref(&self) -> &Self::Target {
        &**self.guard
    }
}

/// Exclusive access to a [`LockedStore`]'s backend.
///
/// Dereferences mutably to the backend. Writes made through one guard become
/// visible to readers together, when the guard is dropped.
pub struct StoreWriteGuard<'a, K, V> {
    guard: RwLockWriteGuard<'a, Box<dyn MapBackend<K, V>>>,
}

impl<K, V> Deref for StoreWriteGuard<'_, K, V> {
    type Target = dyn MapBackend<K, V>;

    fn deref(&self) -> &Self::Target {
        &**self.guard
    }
}

impl<K, V> DerefMut for StoreWriteGuard<'_, K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.guard
    }
}
