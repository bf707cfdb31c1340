//! Cross-thread isolation and stress tests.

use std::sync::{Arc, Barrier};
use std::thread;
use txmap_core::{CoreError, TransactionState};
use txmap_testkit::{
    init_tracing, seeded_overlay, stress_commit_atomicity, stress_suspend_handoff, StressConfig,
    StringOverlay,
};

fn s(value: &str) -> String {
    value.to_string()
}

fn read_elsewhere(map: &Arc<StringOverlay>, key: &str) -> Option<String> {
    let map = Arc::clone(map);
    let key = s(key);
    thread::spawn(move || map.get(&key).unwrap())
        .join()
        .unwrap()
}

#[test]
fn uncommitted_writes_are_invisible_to_other_threads() {
    init_tracing();
    let map = Arc::new(seeded_overlay(&[("a", "1")]));

    map.start_transaction(1).unwrap();
    map.put(s("a"), s("2")).unwrap();
    map.put(s("b"), s("3")).unwrap();

    assert_eq!(read_elsewhere(&map, "a"), Some(s("1")));
    assert_eq!(read_elsewhere(&map, "b"), None);

    map.commit_transaction().unwrap();

    assert_eq!(read_elsewhere(&map, "a"), Some(s("2")));
    assert_eq!(read_elsewhere(&map, "b"), Some(s("3")));
}

#[test]
fn transaction_sees_commits_of_others() {
    let map = Arc::new(seeded_overlay(&[("a", "1")]));

    map.start_transaction(1).unwrap();
    assert_eq!(map.get(&s("a")).unwrap(), Some(s("1")));

    let other = Arc::clone(&map);
    thread::spawn(move || {
        other.start_transaction(2).unwrap();
        other.put(s("a"), s("2")).unwrap();
        other.commit_transaction().unwrap();
    })
    .join()
    .unwrap();

    // read committed, not repeatable read
    assert_eq!(map.get(&s("a")).unwrap(), Some(s("2")));
}

#[test]
fn transactions_on_different_threads_are_independent() {
    let map = Arc::new(StringOverlay::in_memory());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2u32)
        .map(|token| {
            let map = Arc::clone(&map);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                map.start_transaction(token).unwrap();
                map.put(s("k"), token.to_string()).unwrap();
                barrier.wait();
                let seen = map.get(&s("k")).unwrap();
                map.rollback_transaction().unwrap();
                seen
            })
        })
        .collect();

    for (token, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Some(token.to_string()));
    }
    assert!(map.is_empty().unwrap());
}

#[test]
fn suspended_transaction_resumes_on_another_thread() {
    let map = Arc::new(StringOverlay::in_memory());

    map.start_transaction(7).unwrap();
    map.put(s("k"), s("v")).unwrap();
    map.suspend_transaction().unwrap();

    let other = Arc::clone(&map);
    thread::spawn(move || {
        other.resume_transaction(&7).unwrap();
        assert_eq!(other.associated_transaction(), Some(7));
        assert_eq!(other.get(&s("k")).unwrap(), Some(s("v")));
        other.commit_transaction().unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(map.transaction_state(&7), TransactionState::Absent);
    assert_eq!(map.get(&s("k")).unwrap(), Some(s("v")));
}

#[test]
fn token_cannot_be_active_twice() {
    let map = Arc::new(StringOverlay::in_memory());
    map.start_transaction(3).unwrap();

    let other = Arc::clone(&map);
    let err = thread::spawn(move || other.start_transaction(3))
        .join()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, CoreError::TokenInUse { .. }));
    assert!(err.is_lifecycle_violation());

    map.rollback_transaction().unwrap();
    let other = Arc::clone(&map);
    thread::spawn(move || {
        other.start_transaction(3).unwrap();
        other.rollback_transaction().unwrap();
    })
    .join()
    .unwrap();
}

#[test]
fn exiting_thread_rolls_back_its_transaction() {
    init_tracing();
    let map = Arc::new(seeded_overlay(&[("a", "1")]));

    let worker = Arc::clone(&map);
    thread::spawn(move || {
        worker.start_transaction(9).unwrap();
        worker.put(s("k"), s("v")).unwrap();
        worker.remove(&s("a")).unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(map.transaction_state(&9), TransactionState::Absent);
    assert_eq!(map.get(&s("k")).unwrap(), None);
    assert_eq!(map.get(&s("a")).unwrap(), Some(s("1")));

    let stats = map.stats();
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.in_flight(), 0);

    map.start_transaction(9).unwrap();
    map.put(s("k"), s("v")).unwrap();
    map.commit_transaction().unwrap();
    assert_eq!(map.get(&s("k")).unwrap(), Some(s("v")));
}

#[test]
fn exiting_thread_leaves_suspended_transaction_alone() {
    let map = Arc::new(StringOverlay::in_memory());

    let worker = Arc::clone(&map);
    thread::spawn(move || {
        worker.start_transaction(1).unwrap();
        worker.put(s("k"), s("v")).unwrap();
        worker.suspend_transaction().unwrap();
        worker.start_transaction(2).unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(map.transaction_state(&1), TransactionState::Suspended);
    assert_eq!(map.transaction_state(&2), TransactionState::Absent);

    map.resume_transaction(&1).unwrap();
    map.commit_transaction().unwrap();
    assert_eq!(map.get(&s("k")).unwrap(), Some(s("v")));
}

#[test]
fn concurrent_resume_hands_buffer_to_one_thread() {
    let map = Arc::new(StringOverlay::in_memory());
    map.start_transaction(1).unwrap();
    map.suspend_transaction().unwrap();

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let map = Arc::clone(&map);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let resumed = map.resume_transaction(&1).is_ok();
                if resumed {
                    map.rollback_transaction().unwrap();
                }
                resumed
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|resumed| *resumed)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn readers_never_observe_partial_commits() {
    init_tracing();
    let result = stress_commit_atomicity(&StressConfig {
        transactions: 100,
        writers: 3,
        readers: 3,
        batch_size: 16,
    });
    assert!(result.is_clean(), "{result:?}");
}

#[test]
fn suspend_handoff_across_threads() {
    let result = stress_suspend_handoff(200);
    assert!(result.is_clean(), "{result:?}");
    assert_eq!(result.successful_ops, 200);
}
