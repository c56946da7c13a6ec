//! Lightweight, always-cheap-to-read counters for a running journal.
//!
//! Disabled by default ([`crate::config::Config::enable_metrics`]); when
//! off, every increment is skipped rather than merely uncollected.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated as the journal runs.
///
/// All increments use `Ordering::Relaxed`: these are independent counters,
/// not synchronization points, so nothing downstream ever orders other
/// memory accesses against them.
#[derive(Debug, Default)]
pub struct Metrics {
    pushes: AtomicU64,
    push_retries: AtomicU64,
    replayed_frames: AtomicU64,
    replayed_batches: AtomicU64,
    handler_failures: AtomicU64,
    bytes_written: AtomicU64,
}

impl Metrics {
    /// Creates a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_push(&self) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_push_retry(&self) {
        self.push_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_replayed_frames(&self, n: u64) {
        self.replayed_frames.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_replayed_batch(&self) {
        self.replayed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_written(&self, n: u64) {
        self.bytes_written.fetch_add(n, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pushes: self.pushes.load(Ordering::Relaxed),
            push_retries: self.push_retries.load(Ordering::Relaxed),
            replayed_frames: self.replayed_frames.load(Ordering::Relaxed),
            replayed_batches: self.replayed_batches.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// A consistent-enough point-in-time read of [`Metrics`].
///
/// Fields are read independently, so under concurrent activity the values
/// may not correspond to exactly the same instant — fine for monitoring,
/// not for correctness decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total items successfully pushed and made durable.
    pub pushes: u64,
    /// Times a push had to wait for free space before succeeding.
    pub push_retries: u64,
    /// Total frames replayed to the handler across all batches.
    pub replayed_frames: u64,
    /// Total replay batches delivered to the handler.
    pub replayed_batches: u64,
    /// Times the handler returned an error for a batch.
    pub handler_failures: u64,
    /// Total payload bytes written to the device (excludes header updates).
    pub bytes_written: u64,
}
