//! Transaction buffer.

use crate::error::CoreResult;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::trace;
use txmap_storage::LockedStore;

/// Staged changes of one transaction.
///
/// Reads merge the buffer over the committed store:
///
/// 1. a key pending removal reads as absent;
/// 2. a key put in this transaction reads as the put value;
/// 3. after a `clear` in this transaction every other key reads as absent;
/// 4. anything else is read from the store under its shared lock.
///
/// A key is never both pending removal and put: the most recent operation on
/// it wins. Once cleared, the store's contents are irrelevant to this
/// transaction, so removes are no longer recorded.
///
/// Writes never touch the store. They become visible to other readers only
/// through [`crate::Overlay::commit_transaction`].
pub(crate) struct TxBuffer<K, V, T> {
    token: T,
    store: Arc<LockedStore<K, V>>,
    puts: HashMap<K, V>,
    removes: HashSet<K>,
    /// Every key removed since the last clear, including keys put again
    /// afterwards. Only populated when all removes are replayed on commit.
    replayed_removes: HashSet<K>,
    cleared: bool,
    read_only: bool,
    replay_all_removes: bool,
}

impl<K, V, T> TxBuffer<K, V, T>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    /// Creates an empty buffer for the transaction identified by `token`.
    pub(crate) fn new(token: T, store: Arc<LockedStore<K, V>>, replay_all_removes: bool) -> Self {
        Self {
            token,
            store,
            puts: HashMap::new(),
            removes: HashSet::new(),
            replayed_removes: HashSet::new(),
            cleared: false,
            read_only: true,
            replay_all_removes,
        }
    }

    /// Returns the token of the enclosing transaction.
    pub(crate) fn token(&self) -> &T {
        &self.token
    }

    /// Returns the value `key` has in this transaction's view.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn get(&self, key: &K) -> CoreResult<Option<V>> {
        if self.removes.contains(key) {
            return Ok(None);
        }
        if let Some(value) = self.puts.get(key) {
            return Ok(Some(value.clone()));
        }
        if self.cleared {
            return Ok(None);
        }
        Ok(self.store.get(key)?)
    }

    /// Returns true if `key` is present in this transaction's view.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn contains_key(&self, key: &K) -> CoreResult<bool> {
        if self.removes.contains(key) {
            return Ok(false);
        }
        if self.puts.contains_key(key) {
            return Ok(true);
        }
        if self.cleared {
            return Ok(false);
        }
        Ok(self.store.contains_key(key)?)
    }

    /// Returns true if any key maps to `value` in this transaction's view.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn contains_value(&self, value: &V) -> CoreResult<bool> {
        Ok(self.values()?.iter().any(|v| v == value))
    }

    /// Returns a snapshot of the keys in this transaction's view.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn key_set(&self) -> CoreResult<HashSet<K>> {
        let mut keys = HashSet::new();
        if !self.cleared {
            keys.extend(
                self.store
                    .keys()?
                    .into_iter()
                    .filter(|key| !self.removes.contains(key)),
            );
        }
        keys.extend(self.puts.keys().cloned());
        Ok(keys)
    }

    /// Returns a snapshot of the values in this transaction's view.
    ///
    /// Keys are listed and then looked up one by one, each under its own
    /// shared lock. A key removed from the store in between is skipped.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn values(&self) -> CoreResult<Vec<V>> {
        let mut values = Vec::new();
        for key in self.key_set()? {
            if let Some(value) = self.get(&key)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Returns a snapshot of the entries in this transaction's view.
    ///
    /// Same isolation caveat as [`TxBuffer::values`].
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn entry_set(&self) -> CoreResult<Vec<(K, V)>> {
        let mut entries = Vec::new();
        for key in self.key_set()? {
            if let Some(value) = self.get(&key)? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    /// Returns the number of entries in this transaction's view.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.key_set()?.len())
    }

    /// Returns true if this transaction's view has no entries.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Stages a put and returns the value `key` had in this view.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures while reading the previous value. The
    /// buffer is left unchanged in that case.
    pub fn put(&mut self, key: K, value: V) -> CoreResult<Option<V>> {
        let old_value = self.get(&key)?;
        self.read_only = false;
        self.removes.remove(&key);
        self.puts.insert(key, value);
        Ok(old_value)
    }

    /// Stages a removal and returns the value `key` had in this view.
    ///
    /// # Errors
    ///
    /// Propagates backing map failures while reading the previous value. The
    /// buffer is left unchanged in that case.
    pub fn remove(&mut self, key: &K) -> CoreResult<Option<V>> {
        let old_value = self.get(key)?;
        self.read_only = false;
        self.puts.remove(key);
        if !self.cleared {
            self.removes.insert(key.clone());
            if self.replay_all_removes {
                self.replayed_removes.insert(key.clone());
            }
        }
        Ok(old_value)
    }

    /// Stages a put for every entry.
    ///
    /// # Errors
    ///
    /// Stops at the first failed put; earlier entries stay staged.
    pub fn put_all<I>(&mut self, entries: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Stages a clear: this view becomes empty, later puts reappear.
    pub fn clear(&mut self) {
        self.read_only = false;
        self.cleared = true;
        self.puts.clear();
        self.removes.clear();
        self.replayed_removes.clear();
    }

    /// Applies the staged changes to the store.
    ///
    /// A read-only buffer returns without locking. Otherwise the store's
    /// exclusive lock is taken once and held for the whole replay: a clear
    /// (or the removes), then the puts.
    ///
    /// # Errors
    ///
    /// A backing map failure stops the replay and is returned after the lock
    /// has been released. Mutations issued before the failure stay applied.
    pub(crate) fn commit(self) -> CoreResult<()> {
        if self.read_only {
            trace!("read-only transaction, nothing to apply");
            return Ok(());
        }

        let Self {
            store,
            puts,
            removes,
            replayed_removes,
            cleared,
            replay_all_removes,
            ..
        } = self;

        let removes = if replay_all_removes {
            replayed_removes
        } else {
            removes
        };

        let mut guard = store.write();
        if cleared {
            trace!(puts = puts.len(), "applying cleared transaction");
            guard.clear()?;
        } else {
            trace!(
                removes = removes.len(),
                puts = puts.len(),
                replay_all_removes,
                "applying transaction"
            );
            for key in &removes {
                guard.remove(key)?;
            }
        }
        guard.put_all(puts.into_iter().collect())?;
        Ok(())
    }
}

impl<K, V, T: fmt::Debug> fmt::Debug for TxBuffer<K, V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxBuffer")
            .field("token", &self.token)
            .field("puts", &self.puts.len())
            .field("removes", &self.removes.len())
            .field("cleared", &self.cleared)
            .field("read_only", &self.read_only)
            .field("replay_all_removes", &self.replay_all_removes)
            .finish()
    }
}
