//! Active transactions per thread.

use super::TxBuffer;
use crate::stats::OverlayStats;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::warn;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Exit hooks of every registry this thread has activated a buffer in.
    static EXIT_HOOKS: RefCell<ExitHooks> = RefCell::new(ExitHooks::new());
}

trait ExitHook {
    fn is_live(&self) -> bool;
    fn release(&self, thread: ThreadId);
}

struct ExitHooks {
    thread: ThreadId,
    hooks: HashMap<u64, Box<dyn ExitHook>>,
}

impl ExitHooks {
    fn new() -> Self {
        Self {
            thread: thread::current().id(),
            hooks: HashMap::new(),
        }
    }
}

impl Drop for ExitHooks {
    fn drop(&mut self) {
        for hook in self.hooks.values() {
            hook.release(self.thread);
        }
    }
}

struct ReleaseOnExit<K, V, T> {
    registry: Weak<TxRegistry<K, V, T>>,
}

impl<K, V, T> ExitHook for ReleaseOnExit<K, V, T>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
    T: Eq + Hash + Clone + Debug + 'static,
{
    fn is_live(&self) -> bool {
        self.registry.strong_count() > 0
    }

    fn release(&self, thread: ThreadId) {
        if let Some(registry) = self.registry.upgrade() {
            registry.abandon(thread);
        }
    }
}

/// The buffer active on each thread, the tokens in flight and the lifecycle
/// counters of one overlay.
///
/// A token is in flight from start until commit, rollback or the exit of
/// the thread it is active on, whichever comes first.
pub(crate) struct TxRegistry<K, V, T> {
    id: u64,
    pub(crate) active: DashMap<ThreadId, TxBuffer<K, V, T>>,
    pub(crate) in_flight: Mutex<HashSet<T>>,
    pub(crate) stats: OverlayStats,
}

impl<K, V, T> TxRegistry<K, V, T>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
    T: Eq + Hash + Clone + Debug + 'static,
{
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            active: DashMap::new(),
            in_flight: Mutex::new(HashSet::new()),
            stats: OverlayStats::new(),
        })
    }

    /// Makes `buffer` the active transaction of `thread`, which must be the
    /// calling thread.
    pub(crate) fn activate(self: &Arc<Self>, thread: ThreadId, buffer: TxBuffer<K, V, T>) {
        self.active.insert(thread, buffer);

        // Fails only while this thread's locals are being torn down; the
        // hook already registered for this registry still runs then.
        let _ = EXIT_HOOKS.try_with(|hooks| {
            let mut hooks = hooks.borrow_mut();
            if !hooks.hooks.contains_key(&self.id) {
                hooks.hooks.retain(|_, hook| hook.is_live());
                let hook = ReleaseOnExit {
                    registry: Arc::downgrade(self),
                };
                hooks.hooks.insert(self.id, Box::new(hook));
            }
        });
    }

    /// Rolls back the transaction left active by an exited thread.
    fn abandon(&self, thread: ThreadId) {
        if let Some((_, buffer)) = self.active.remove(&thread) {
            self.in_flight.lock().remove(buffer.token());
            warn!(token = ?buffer.token(), "thread exited with an active transaction, rolled back");
            self.stats.record_abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use txmap_storage::LockedStore;

    type Registry = TxRegistry<String, u32, u32>;

    fn activate(registry: &Arc<Registry>, token: u32) {
        let store = Arc::new(LockedStore::new(HashMap::<String, u32>::new()));
        registry.in_flight.lock().insert(token);
        registry.activate(thread::current().id(), TxBuffer::new(token, store, false));
    }

    #[test]
    fn exiting_thread_releases_its_buffer() {
        let registry = Registry::new();

        let worker = Arc::clone(&registry);
        thread::spawn(move || activate(&worker, 4)).join().unwrap();

        assert!(registry.active.is_empty());
        assert!(registry.in_flight.lock().is_empty());
        assert_eq!(registry.stats.snapshot().abandoned, 1);
    }

    #[test]
    fn exit_hook_registered_once_per_registry() {
        let registry = Registry::new();
        activate(&registry, 1);
        registry.active.clear();
        activate(&registry, 2);

        let hooks = EXIT_HOOKS.with(|hooks| {
            hooks
                .borrow()
                .hooks
                .keys()
                .filter(|id| **id == registry.id)
                .count()
        });
        assert_eq!(hooks, 1);
    }

    #[test]
    fn dropped_registry_is_skipped_on_exit() {
        thread::spawn(|| {
            let registry = Registry::new();
            activate(&registry, 1);
            drop(registry);

            let replacement = Registry::new();
            activate(&replacement, 2);

            EXIT_HOOKS.with(|hooks| {
                let hooks = hooks.borrow();
                assert_eq!(hooks.hooks.len(), 1);
                assert!(hooks.hooks.values().all(|hook| hook.is_live()));
            });
        })
        .join()
        .unwrap();
    }
}
