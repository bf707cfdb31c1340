//! The transactional overlay.

use crate::config::OverlayConfig;
use crate::error::{CoreError, CoreResult};
use crate::stats::StatsSnapshot;
use crate::transaction::{TransactionState, TxBuffer, TxRegistry};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, warn};
use txmap_storage::{LockStats, LockedStore, MapBackend};

/// A map with read-committed transactions layered over a backing map.
///
/// Without an active transaction every operation goes straight to the
/// backing map under the store's lock. After [`Overlay::start_transaction`]
/// the calling thread's operations are staged in a transaction buffer: they see
/// their own writes, while every other caller keeps seeing the last
/// committed state. [`Overlay::commit_transaction`] applies the staged writes
/// atomically; [`Overlay::rollback_transaction`] discards them.
///
/// ## Scoping
///
/// The active transaction is scoped to the calling thread. To hand a
/// transaction to another thread, suspend it on the first thread and resume
/// it by token on the second. Suspended transactions are shared by all
/// threads.
///
/// A thread that exits with an active transaction has it rolled back on
/// exit, which frees its token.
///
/// ## Example
///
/// ```rust
/// use std::collections::HashMap;
/// use txmap_core::Overlay;
///
/// let map: Overlay<&str, u32, u64> = Overlay::new(HashMap::from([("a", 1)]));
///
/// map.start_transaction(1).unwrap();
/// map.put("b", 2).unwrap();
/// map.remove(&"a").unwrap();
/// assert_eq!(map.get(&"a").unwrap(), None);
/// map.commit_transaction().unwrap();
///
/// assert_eq!(map.get(&"b").unwrap(), Some(2));
/// assert_eq!(map.len().unwrap(), 1);
/// ```
pub struct Overlay<K, V, T> {
    store: Arc<LockedStore<K, V>>,
    /// Active transaction per thread, tokens in flight and counters.
    registry: Arc<TxRegistry<K, V, T>>,
    suspended: DashMap<T, TxBuffer<K, V, T>>,
    config: OverlayConfig,
}

fn current_thread() -> ThreadId {
    thread::current().id()
}

impl<K, V, T> Overlay<K, V, T>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
    T: Eq + Hash + Clone + Debug + 'static,
{
    /// Creates an overlay over `backend` in minimal-apply commit mode.
    pub fn new<B>(backend: B) -> Self
    where
        B: MapBackend<K, V> + 'static,
    {
        Self::with_config(backend, OverlayConfig::default())
    }

    /// Creates an overlay over `backend` with the given configuration.
    pub fn with_config<B>(backend: B, config: OverlayConfig) -> Self
    where
        B: MapBackend<K, V> + 'static,
    {
        Self::from_store(Arc::new(LockedStore::new(backend)), config)
    }

    /// Creates an overlay over an existing locked store.
    ///
    /// The overlay assumes nothing else mutates the store while it is live.
    #[must_use]
    pub fn from_store(store: Arc<LockedStore<K, V>>, config: OverlayConfig) -> Self {
        Self {
            store,
            registry: TxRegistry::new(),
            suspended: DashMap::new(),
            config,
        }
    }

    /// Creates an overlay over a fresh empty `HashMap`.
    #[must_use]
    pub fn in_memory() -> Self
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        Self::new(HashMap::new())
    }

    /// Returns the configuration this overlay was built with.
    #[must_use]
    pub fn config(&self) -> OverlayConfig {
        self.config
    }

    /// Returns true if every remove is replayed against the backing map on
    /// commit, even when superseded by a later put.
    #[must_use]
    pub fn replays_all_removes(&self) -> bool {
        self.config.replay_all_removes
    }

    /// Returns the underlying locked store.
    #[must_use]
    pub fn store(&self) -> &Arc<LockedStore<K, V>> {
        &self.store
    }

    /// Returns the lifecycle counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.registry.stats.snapshot()
    }

    /// Returns how often the store's lock has been taken in each mode.
    #[must_use]
    pub fn lock_stats(&self) -> LockStats {
        self.store.lock_stats()
    }

    // ========================================================================
    // Map operations
    // ========================================================================

    /// Returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn get(&self, key: &K) -> CoreResult<Option<V>> {
        match self.registry.active.get(&current_thread()) {
            Some(tx) => tx.value().get(key),
            None => Ok(self.store.get(key)?),
        }
    }

    /// Returns true if `key` is present.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn contains_key(&self, key: &K) -> CoreResult<bool> {
        match self.registry.active.get(&current_thread()) {
            Some(tx) => tx.value().contains_key(key),
            None => Ok(self.store.contains_key(key)?),
        }
    }

    /// Returns true if any key maps to `value`.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn contains_value(&self, value: &V) -> CoreResult<bool> {
        match self.registry.active.get(&current_thread()) {
            Some(tx) => tx.value().contains_value(value),
            None => Ok(self.store.contains_value(value)?),
        }
    }

    /// Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn len(&self) -> CoreResult<usize> {
        match self.registry.active.get(&current_thread()) {
            Some(tx) => tx.value().len(),
            None => Ok(self.store.len()?),
        }
    }

    /// Returns true if there are no entries.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn is_empty(&self) -> CoreResult<bool> {
        match self.registry.active.get(&current_thread()) {
            Some(tx) => tx.value().is_empty(),
            None => Ok(self.store.is_empty()?),
        }
    }

    /// Returns a snapshot of the keys.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn key_set(&self) -> CoreResult<HashSet<K>> {
        match self.registry.active.get(&current_thread()) {
            Some(tx) => tx.value().key_set(),
            None => Ok(self.store.keys()?.into_iter().collect()),
        }
    }

    /// Returns a snapshot of the values.
    ///
    /// Inside a transaction, values of keys that vanish from the store while
    /// the snapshot is assembled are skipped.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn values(&self) -> CoreResult<Vec<V>> {
        match self.registry.active.get(&current_thread()) {
            Some(tx) => tx.value().values(),
            None => Ok(self.store.values()?),
        }
    }

    /// Returns a snapshot of the entries.
    ///
    /// Same caveat as [`Overlay::values`].
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn entry_set(&self) -> CoreResult<Vec<(K, V)>> {
        match self.registry.active.get(&current_thread()) {
            Some(tx) => tx.value().entry_set(),
            None => Ok(self.store.entries()?),
        }
    }

    /// Stores `value` under `key`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn put(&self, key: K, value: V) -> CoreResult<Option<V>> {
        match self.registry.active.get_mut(&current_thread()) {
            Some(mut tx) => tx.value_mut().put(key, value),
            None => Ok(self.store.put(key, value)?),
        }
    }

    /// Stores every entry.
    ///
    /// Without a transaction the entries are written under one exclusive
    /// lock acquisition.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn put_all<I>(&self, entries: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        match self.registry.active.get_mut(&current_thread()) {
            Some(mut tx) => tx.value_mut().put_all(entries),
            None => Ok(self.store.put_all(entries.into_iter().collect())?),
        }
    }

    /// Removes `key`, returning the value it had.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn remove(&self, key: &K) -> CoreResult<Option<V>> {
        match self.registry.active.get_mut(&current_thread()) {
            Some(mut tx) => tx.value_mut().remove(key),
            None => Ok(self.store.remove(key)?),
        }
    }

    /// Removes all entries.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn clear(&self) -> CoreResult<()> {
        match self.registry.active.get_mut(&current_thread()) {
            Some(mut tx) => {
                tx.value_mut().clear();
                Ok(())
            }
            None => Ok(self.store.clear()?),
        }
    }

    // ========================================================================
    // Transaction lifecycle
    // ========================================================================

    /// Starts a transaction identified by `token` on the calling thread.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TransactionAlreadyActive`] if this thread already has
    ///   an active transaction
    /// - [`CoreError::AlreadySuspended`] if `token` is parked in the
    ///   suspended registry
    /// - [`CoreError::TokenInUse`] if `token` is active on another thread
    pub fn start_transaction(&self, token: T) -> CoreResult<()> {
        let thread = current_thread();
        if self.registry.active.contains_key(&thread) {
            return Err(CoreError::transaction_already_active("start"));
        }

        {
            let mut in_flight = self.registry.in_flight.lock();
            if in_flight.contains(&token) {
                return Err(if self.suspended.contains_key(&token) {
                    CoreError::already_suspended(&token)
                } else {
                    CoreError::token_in_use(&token)
                });
            }
            in_flight.insert(token.clone());
        }

        debug!(?token, "transaction started");
        let buffer = TxBuffer::new(
            token,
            Arc::clone(&self.store),
            self.config.replay_all_removes,
        );
        self.registry.activate(thread, buffer);
        self.registry.stats.record_start();
        Ok(())
    }

    /// Commits the calling thread's active transaction.
    ///
    /// The transaction ends whether or not the commit succeeds.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NoActiveTransaction`] if this thread has no active
    ///   transaction
    /// - [`CoreError::Storage`] if the backing map fails mid-commit; the
    ///   store is left partially applied
    pub fn commit_transaction(&self) -> CoreResult<()> {
        let (_, buffer) = self
            .registry
            .active
            .remove(&current_thread())
            .ok_or_else(|| CoreError::no_active_transaction("commit"))?;

        let token = buffer.token().clone();
        let result = buffer.commit();
        self.registry.in_flight.lock().remove(&token);

        match &result {
            Ok(()) => {
                debug!(?token, "transaction committed");
                self.registry.stats.record_commit();
            }
            Err(error) => {
                warn!(?token, %error, "commit failed, store may be partially applied");
                self.registry.stats.record_commit_failure();
            }
        }
        result
    }

    /// Discards the calling thread's active transaction.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoActiveTransaction`] if this thread has no active
    /// transaction.
    pub fn rollback_transaction(&self) -> CoreResult<()> {
        let (_, buffer) = self
            .registry
            .active
            .remove(&current_thread())
            .ok_or_else(|| CoreError::no_active_transaction("roll back"))?;

        self.registry.in_flight.lock().remove(buffer.token());
        debug!(token = ?buffer.token(), "transaction rolled back");
        self.registry.stats.record_rollback();
        Ok(())
    }

    /// Parks the calling thread's active transaction in the suspended
    /// registry, keyed by its token.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoActiveTransaction`] if this thread has no active
    /// transaction.
    pub fn suspend_transaction(&self) -> CoreResult<()> {
        let (_, buffer) = self
            .registry
            .active
            .remove(&current_thread())
            .ok_or_else(|| CoreError::no_active_transaction("suspend"))?;

        let token = buffer.token().clone();
        debug!(?token, "transaction suspended");
        self.suspended.insert(token, buffer);
        self.registry.stats.record_suspend();
        Ok(())
    }

    /// Moves the suspended transaction `token` into the calling thread's
    /// active slot.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TransactionAlreadyActive`] if this thread already has
    ///   an active transaction
    /// - [`CoreError::NotSuspended`] if no transaction with `token` is
    ///   suspended
    pub fn resume_transaction(&self, token: &T) -> CoreResult<()> {
        let thread = current_thread();
        if self.registry.active.contains_key(&thread) {
            return Err(CoreError::transaction_already_active("resume"));
        }

        let (_, buffer) = self
            .suspended
            .remove(token)
            .ok_or_else(|| CoreError::not_suspended(token))?;

        debug!(?token, "transaction resumed");
        self.registry.activate(thread, buffer);
        self.registry.stats.record_resume();
        Ok(())
    }

    /// Returns the token of the calling thread's active transaction.
    #[must_use]
    pub fn associated_transaction(&self) -> Option<T> {
        self.registry
            .active
            .get(&current_thread())
            .map(|tx| tx.token().clone())
    }

    /// Returns where `token` stands on this overlay.
    #[must_use]
    pub fn transaction_state(&self, token: &T) -> TransactionState {
        let in_flight = self.registry.in_flight.lock();
        if !in_flight.contains(token) {
            TransactionState::Absent
        } else if self.suspended.contains_key(token) {
            TransactionState::Suspended
        } else {
            TransactionState::Active
        }
    }

    /// Returns the number of suspended transactions.
    #[must_use]
    pub fn suspended_count(&self) -> usize {
        self.suspended.len()
    }

    /// Runs `f` inside a transaction on the calling thread.
    ///
    /// The transaction is committed if `f` returns `Ok` and rolled back if
    /// it returns `Err`. `f` must leave the transaction active; if it
    /// suspends or ends it, the commit reports
    /// [`CoreError::NoActiveTransaction`].
    ///
    /// # Errors
    ///
    /// Returns lifecycle errors from starting or committing, backing map
    /// failures from the commit, or the error returned by `f`.
    pub fn transaction<F, R>(&self, token: T, f: F) -> CoreResult<R>
    where
        F: FnOnce(&Self) -> CoreResult<R>,
    {
        self.start_transaction(token.clone())?;
        match f(self) {
            Ok(value) => {
                self.commit_transaction()?;
                Ok(value)
            }
            Err(error) => {
                if self.associated_transaction().as_ref() == Some(&token) {
                    self.rollback_transaction()?;
                }
                Err(error)
            }
        }
    }
}

impl<K, V, T> Default for Overlay<K, V, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
    T: Eq + Hash + Clone + Debug + 'static,
{
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<K, V, T> fmt::Debug for Overlay<K, V, T>
where
    T: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("config", &self.config)
            .field("active", &self.registry.active.len())
            .field("suspended", &self.suspended.len())
            .field("stats", &self.registry.stats.snapshot())
            .finish_non_exhaustive()
    }
}
