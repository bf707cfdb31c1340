//! Stress tests for overlay concurrency.
//!
//! These harnesses run committing transactions and plain readers on
//! separate threads and count any observation that breaks read-committed
//! isolation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use txmap_core::Overlay;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Observations that violated isolation.
    pub anomalies: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, anomalies: usize, duration: Duration) -> Self {
        Self {
            total_ops: successful + failed,
            successful_ops: successful,
            failed_ops: failed,
            anomalies,
            duration,
        }
    }

    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total_ops as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Returns true if every operation succeeded and no anomaly was seen.
    pub fn is_clean(&self) -> bool {
        self.failed_ops == 0 && self.anomalies == 0
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Transactions committed by each writer thread.
    pub transactions: usize,
    /// Number of writer threads.
    pub writers: usize,
    /// Number of reader threads.
    pub readers: usize,
    /// Keys written by every transaction.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            transactions: 200,
            writers: 2,
            readers: 4,
            batch_size: 32,
        }
    }
}

/// Checks that plain readers never observe part of a commit.
///
/// Every transaction writes the same generation value to all keys of the
/// batch. A reader snapshot taken outside a transaction must therefore be
/// empty or hold a full batch of a single generation.
pub fn stress_commit_atomicity(config: &StressConfig) -> StressTestResult {
    let overlay: Arc<Overlay<usize, usize, (usize, usize)>> = Arc::new(Overlay::in_memory());
    let done = Arc::new(AtomicBool::new(false));
    let anomalies = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let readers: Vec<_> = (0..config.readers)
        .map(|_| {
            let overlay = Arc::clone(&overlay);
            let done = Arc::clone(&done);
            let anomalies = Arc::clone(&anomalies);
            let batch_size = config.batch_size;
            thread::spawn(move || {
                let mut reads = 0usize;
                while !done.load(Ordering::Acquire) {
                    if let Ok(entries) = overlay.entry_set() {
                        let partial = !entries.is_empty() && entries.len() != batch_size;
                        let mixed = entries.windows(2).any(|pair| pair[0].1 != pair[1].1);
                        if partial || mixed {
                            anomalies.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    let writers: Vec<_> = (0..config.writers)
        .map(|writer| {
            let overlay = Arc::clone(&overlay);
            let config = config.clone();
            thread::spawn(move || {
                let mut ok = 0usize;
                let mut failed = 0usize;
                for n in 0..config.transactions {
                    let generation = writer * config.transactions + n;
                    let result = overlay.transaction((writer, n), |tx| {
                        tx.put_all((0..config.batch_size).map(|key| (key, generation)))
                    });
                    match result {
                        Ok(()) => ok += 1,
                        Err(_) => failed += 1,
                    }
                }
                (ok, failed)
            })
        })
        .collect();

    let mut successful = 0usize;
    let mut failed = 0usize;
    for writer in writers {
        match writer.join() {
            Ok((ok, err)) => {
                successful += ok;
                failed += err;
            }
            Err(_) => failed += 1,
        }
    }

    done.store(true, Ordering::Release);
    for reader in readers {
        match reader.join() {
            Ok(reads) => successful += reads,
            Err(_) => failed += 1,
        }
    }

    let result = StressTestResult::new(
        successful,
        failed,
        anomalies.load(Ordering::Relaxed),
        start.elapsed(),
    );
    debug!(
        ops = result.total_ops,
        anomalies = result.anomalies,
        ops_per_sec = result.ops_per_second(),
        "commit atomicity stress finished"
    );
    result
}

/// Suspends transactions on one thread and commits them on another.
///
/// The producer stages one key per transaction, checks that the write is
/// invisible outside the transaction, and suspends it. The consumer resumes
/// each token, checks it reads its own write, and commits. Every key must be
/// present afterwards.
pub fn stress_suspend_handoff(transactions: usize) -> StressTestResult {
    let overlay: Arc<Overlay<usize, usize, usize>> = Arc::new(Overlay::in_memory());
    let (sender, receiver) = mpsc::channel::<usize>();
    let start = Instant::now();

    let producer = {
        let overlay = Arc::clone(&overlay);
        thread::spawn(move || {
            let mut anomalies = 0usize;
            let mut failed = 0usize;
            for token in 0..transactions {
                let staged = overlay
                    .start_transaction(token)
                    .and_then(|()| overlay.put(token, token * 2))
                    .and_then(|_| overlay.suspend_transaction());
                if staged.is_err() {
                    failed += 1;
                    continue;
                }
                if !matches!(overlay.get(&token), Ok(None)) {
                    anomalies += 1;
                }
                if sender.send(token).is_err() {
                    failed += 1;
                }
            }
            (anomalies, failed)
        })
    };

    let consumer = {
        let overlay = Arc::clone(&overlay);
        thread::spawn(move || {
            let mut anomalies = 0usize;
            let mut ok = 0usize;
            let mut failed = 0usize;
            for token in receiver {
                if overlay.resume_transaction(&token).is_err() {
                    failed += 1;
                    continue;
                }
                if !matches!(overlay.get(&token), Ok(Some(v)) if v == token * 2) {
                    anomalies += 1;
                }
                match overlay.commit_transaction() {
                    Ok(()) => ok += 1,
                    Err(_) => failed += 1,
                }
            }
            (anomalies, ok, failed)
        })
    };

    let (producer_anomalies, producer_failed) = producer.join().unwrap_or((0, transactions));
    let (consumer_anomalies, ok, consumer_failed) =
        consumer.join().unwrap_or((0, 0, transactions));

    let mut anomalies = producer_anomalies + consumer_anomalies;
    for token in 0..transactions {
        if !matches!(overlay.get(&token), Ok(Some(v)) if v == token * 2) {
            anomalies += 1;
        }
    }

    let result = StressTestResult::new(
        ok,
        producer_failed + consumer_failed,
        anomalies,
        start.elapsed(),
    );
    debug!(
        ops = result.total_ops,
        anomalies = result.anomalies,
        "suspend handoff stress finished"
    );
    result
}
