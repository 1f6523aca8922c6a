//! The admission loop.
//!
//! A single task owns every dispatch decision: it polls the queue,
//! consults the rate-limit tracker, and hands admissible requests to
//! the worker pool under a semaphore permit. Workers never gate on the
//! tracker themselves, so a window reopening cannot stampede the
//! server. An exhausted window pauses the loop until the reset instant;
//! shutdown interrupts any wait.

use crate::config::EnrichmentConfig;
use crate::metrics::EnrichmentMetrics;
use crate::queue::RequestQueue;
use crate::ratelimit::RateLimitTracker;
use crate::worker::Worker;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info};

pub(crate) struct Dispatcher {
    config: EnrichmentConfig,
    queue: Arc<RequestQueue>,
    tracker: Arc<RateLimitTracker>,
    worker: Arc<Worker>,
    permits: Arc<Semaphore>,
    metrics: Arc<EnrichmentMetrics>,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    pub(crate) fn new(
        config: EnrichmentConfig,
        queue: Arc<RequestQueue>,
        tracker: Arc<RateLimitTracker>,
        worker: Arc<Worker>,
        permits: Arc<Semaphore>,
        metrics: Arc<EnrichmentMetrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            queue,
            tracker,
            worker,
            permits,
            metrics,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("dispatcher started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let admission = self.tracker.admission();
            if admission.is_exhausted() {
                match admission.until_reset() {
                    Some(wait) => {
                        info!(
                            wait_secs = wait.as_secs_f64(),
                            "rate limit exhausted; pausing dispatch until the window resets"
                        );
                        self.metrics.rate_limit_waits.fetch_add(1, Ordering::Relaxed);
                        if self.interruptible_sleep(wait).await {
                            break;
                        }
                        // The next response re-establishes ground truth.
                        self.tracker.forget_remaining();
                    }
                    // The reset instant is already behind us.
                    None if admission.reset_at_ms > 0 => self.tracker.forget_remaining(),
                    // No reset known; the requeue back-off below paces us.
                    None => {}
                }
            }

            let Some(request) = self.queue.poll(self.config.queue_poll_interval).await else {
                continue;
            };

            // Capacity may have drained while we were polling.
            let admission = self.tracker.admission();
            if admission.is_exhausted() {
                self.queue.offer(request);
                let until_reset = admission.until_reset();
                let backoff = until_reset
                    .map(|d| d.min(self.config.rate_limit_backoff_cap))
                    .unwrap_or(self.config.requeue_backoff);
                debug!(
                    backoff_ms = backoff.as_millis() as u64,
                    "window exhausted; requeueing and backing off"
                );
                self.metrics.rate_limit_waits.fetch_add(1, Ordering::Relaxed);
                if self.interruptible_sleep(backoff).await {
                    break;
                }
                if until_reset.is_none() {
                    // Exhausted with no reset instant to wait out: probe
                    // again and let the next response set the window.
                    self.tracker.forget_remaining();
                }
                continue;
            }

            let permits = Arc::clone(&self.permits);
            let permit = tokio::select! {
                result = self.shutdown.wait_for(|stop| *stop) => {
                    let _ = result;
                    self.queue.offer(request);
                    break;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let worker = Arc::clone(&self.worker);
            tokio::spawn(async move {
                worker.execute(request).await;
                drop(permit);
            });
        }
        debug!("dispatcher stopped");
    }

    /// Sleep for `duration` unless shutdown fires first; returns whether
    /// it did.
    async fn interruptible_sleep(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.shutdown.wait_for(|stop| *stop) => true,
        }
    }
}
