//! Engine counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated across the submission path, workers, and the
/// dispatcher.
#[derive(Debug, Default)]
pub struct EnrichmentMetrics {
    /// Total `submit` calls.
    pub submitted: AtomicU64,
    /// Submissions answered synchronously from a positive cache entry.
    pub cache_hits: AtomicU64,
    /// Submissions answered synchronously from a negative cache entry.
    pub negative_hits: AtomicU64,
    /// Definitions fetched over the network (200).
    pub fetched: AtomicU64,
    /// Resources confirmed absent over the network (404).
    pub absent: AtomicU64,
    /// Requeues caused by 429 responses.
    pub rate_limit_requeues: AtomicU64,
    /// Requeues caused by transport errors or unexpected statuses.
    pub transport_requeues: AtomicU64,
    /// Requests abandoned after exhausting their attempts.
    pub abandoned: AtomicU64,
    /// Times the dispatcher paused for a rate-limit window to reset.
    pub rate_limit_waits: AtomicU64,
}

/// Point-in-time copy of [`EnrichmentMetrics`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EnrichmentMetricsSnapshot {
    pub submitted: u64,
    pub cache_hits: u64,
    pub negative_hits: u64,
    pub fetched: u64,
    pub absent: u64,
    pub rate_limit_requeues: u64,
    pub transport_requeues: u64,
    pub abandoned: u64,
    pub rate_limit_waits: u64,
}

impl EnrichmentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> EnrichmentMetricsSnapshot {
        EnrichmentMetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            absent: self.absent.load(Ordering::Relaxed),
            rate_limit_requeues: self.rate_limit_requeues.load(Ordering::Relaxed),
            transport_requeues: self.transport_requeues.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            rate_limit_waits: self.rate_limit_waits.load(Ordering::Relaxed),
        }
    }
}
