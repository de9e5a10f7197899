//! Result aggregation for transfer runs.
//!
//! Workers never touch the counters directly: every outcome travels over a
//! channel to [`Aggregator::run`], which applies it to the shared
//! [`TransferStats`] and forwards it to the observer.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::task::{TransferOutcome, TransferStatus};

/// Failure reasons kept for the final report; later failures are only counted
pub const MAX_FAILURE_LOG: usize = 1000;

/// Final counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl Summary {
    /// Percentage of objects transferred, 0 when nothing was listed
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }

    /// Whether every listed object made it
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- Summary ---")?;
        writeln!(f, "Total Files: {}", self.total)?;
        writeln!(f, "Succeeded: {}", self.succeeded)?;
        writeln!(f, "Errors: {}", self.failed)?;
        write!(f, "Success Rate: {:.2}%", self.success_rate())
    }
}

/// A failed object and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub key: String,
    pub reason: String,
}

/// Point-in-time view of a running transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Objects handed to the pipeline so far
    pub discovered: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub bytes: u64,
    /// Set once enumeration has finished and `discovered` is final
    pub listing_complete: bool,
}

impl StatsSnapshot {
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Counters shared between the dispatcher, the aggregator and observers
#[derive(Debug, Default)]
pub struct TransferStats {
    discovered: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
    listing_complete: AtomicBool,
    failures: Mutex<Vec<FailureRecord>>,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one object entering the pipeline
    pub fn record_discovered(&self) -> u64 {
        self.discovered.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Freeze the total once enumeration is over
    pub fn mark_listing_complete(&self) {
        self.listing_complete.store(true, Ordering::Release);
    }

    /// Apply one outcome to the counters
    pub fn record(&self, outcome: &TransferOutcome) {
        match &outcome.status {
            TransferStatus::Success { bytes } => {
                self.bytes.fetch_add(*bytes, Ordering::Relaxed);
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            TransferStatus::Failure { reason } => {
                {
                    let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
                    if failures.len() < MAX_FAILURE_LOG {
                        failures.push(FailureRecord {
                            key: outcome.source.key.clone(),
                            reason: reason.clone(),
                        });
                    }
                }
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            listing_complete: self.listing_complete.load(Ordering::Acquire),
            discovered: self.discovered.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }

    /// Summary using the discovered count as the total
    pub fn summary(&self) -> Summary {
        let snapshot = self.snapshot();
        Summary {
            total: snapshot.discovered,
            succeeded: snapshot.succeeded,
            failed: snapshot.failed,
        }
    }

    /// Recorded failures, oldest first
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Receives every outcome as the aggregator applies it
///
/// Called from a single task, in completion order.
pub trait TransferObserver: Send + Sync {
    /// An object finished, successfully or not
    fn on_outcome(&self, _outcome: &TransferOutcome, _stats: &StatsSnapshot) {}

    /// Enumeration finished; `total` objects will report
    fn on_listing_complete(&self, _total: u64) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Consumer side of the outcome channel
pub struct Aggregator {
    stats: Arc<TransferStats>,
    observer: Arc<dyn TransferObserver>,
}

impl Aggregator {
    pub fn new(stats: Arc<TransferStats>, observer: Arc<dyn TransferObserver>) -> Self {
        Self { stats, observer }
    }

    /// Drain outcomes until every sender is dropped; returns how many arrived
    pub async fn run(self, mut outcomes: mpsc::Receiver<TransferOutcome>) -> u64 {
        let mut received = 0;
        while let Some(outcome) = outcomes.recv().await {
            self.stats.record(&outcome);
            received += 1;
            self.observer.on_outcome(&outcome, &self.stats.snapshot());
        }
        received
    }
}
