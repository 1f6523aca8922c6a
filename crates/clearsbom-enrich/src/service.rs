//! The public enrichment facade.
//!
//! Owns the queue, tracker, metrics, dispatcher task, and worker pool.
//! Callers submit `(component, uri)` pairs and get back single-shot
//! futures; cached content resolves synchronously, everything else goes
//! through the dispatcher.

use crate::component::Component;
use crate::config::EnrichmentConfig;
use crate::dispatcher::Dispatcher;
use crate::license;
use crate::metrics::{EnrichmentMetrics, EnrichmentMetricsSnapshot};
use crate::queue::RequestQueue;
use crate::ratelimit::{RateLimitSnapshot, RateLimitTracker};
use crate::request::{EnrichError, EnrichOutcome, EnrichmentFuture, EnrichmentRequest, InFlight};
use crate::worker::Worker;
use clearsbom_cache::{ContentError, ContentHandler};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

/// Rate-limit-aware ClearlyDefined enrichment service.
///
/// Construction spawns the dispatcher; [`shutdown`](Self::shutdown)
/// tears it down again. Quiescence (no queued work, no unresolved
/// futures) can be awaited with
/// [`wait_for_completion`](Self::wait_for_completion) and is independent
/// of shutdown.
pub struct EnrichmentService {
    config: EnrichmentConfig,
    content: Arc<dyn ContentHandler>,
    queue: Arc<RequestQueue>,
    tracker: Arc<RateLimitTracker>,
    flight: Arc<InFlight>,
    metrics: Arc<EnrichmentMetrics>,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EnrichmentService {
    /// Build the HTTP client and start the dispatcher.
    pub async fn new(
        config: EnrichmentConfig,
        content: Arc<dyn ContentHandler>,
    ) -> Result<Self, EnrichError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        let queue = Arc::new(RequestQueue::new());
        let tracker = Arc::new(RateLimitTracker::new());
        let metrics = Arc::new(EnrichmentMetrics::new());
        let permits = Arc::new(Semaphore::new(config.worker_count));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = Arc::new(Worker::new(
            client,
            Arc::clone(&content),
            Arc::clone(&tracker),
            Arc::clone(&queue),
            Arc::clone(&metrics),
            config.max_attempts,
        ));
        let dispatcher = Dispatcher::new(
            config.clone(),
            Arc::clone(&queue),
            Arc::clone(&tracker),
            worker,
            Arc::clone(&permits),
            Arc::clone(&metrics),
            shutdown_rx,
        );
        let handle = tokio::spawn(dispatcher.run());

        info!(
            worker_count = config.worker_count,
            "enrichment service started"
        );

        Ok(Self {
            config,
            content,
            queue,
            tracker,
            flight: Arc::new(InFlight::new()),
            metrics,
            permits,
            shutdown,
            dispatcher: Mutex::new(Some(handle)),
        })
    }

    /// Submit a component for enrichment against `uri`.
    ///
    /// A positive cache entry annotates the component and returns an
    /// already-resolved future before this call returns; a negative
    /// entry returns an already-resolved [`EnrichOutcome::Absent`]. Only
    /// a miss enqueues a request. May be called concurrently from any
    /// number of tasks.
    pub async fn submit(&self, component: Arc<dyn Component>, uri: Url) -> EnrichmentFuture {
        self.metrics.submitted.fetch_add(1, Ordering::Relaxed);

        if *self.shutdown.borrow() {
            return EnrichmentFuture::ready(Err(EnrichError::ServiceStopped));
        }

        match self.content.get_content(uri.as_str()).await {
            Ok(payload) => {
                self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                license::annotate(component.as_ref(), &payload);
                EnrichmentFuture::ready(Ok(EnrichOutcome::Enriched))
            }
            Err(ContentError::Absent) => {
                self.metrics.negative_hits.fetch_add(1, Ordering::Relaxed);
                EnrichmentFuture::ready(Ok(EnrichOutcome::Absent))
            }
            Err(lookup) => {
                if let ContentError::Io(e) = &lookup {
                    warn!(uri = %uri, error = %e, "cache lookup failed; fetching");
                }
                let (request, future) =
                    EnrichmentRequest::new(component, uri, InFlight::launch(&self.flight));
                self.queue.offer(request);
                future
            }
        }
    }

    /// Block until every submitted request has resolved.
    ///
    /// Returns promptly when the service is already idle. Does not stop
    /// the dispatcher; new submissions remain possible afterwards.
    pub async fn wait_for_completion(&self) {
        self.flight.idle().await;
    }

    /// Stop the dispatcher, drain the worker pool, and resolve whatever
    /// is still queued with [`EnrichError::ServiceStopped`]. Safe to
    /// call more than once.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.config.shutdown_grace, handle)
                .await
                .is_err()
            {
                warn!("dispatcher did not stop within the grace period; aborting");
                abort.abort();
            }
        }

        // Workers hand their permits back as they finish; holding the
        // full pool means none are running.
        match tokio::time::timeout(
            self.config.shutdown_grace,
            Arc::clone(&self.permits).acquire_many_owned(self.config.worker_count as u32),
        )
        .await
        {
            Ok(_) => {}
            Err(_) => warn!("worker pool did not drain within the grace period"),
        }

        let abandoned = self.queue.drain();
        if !abandoned.is_empty() {
            info!(
                count = abandoned.len(),
                "resolving requests abandoned by shutdown"
            );
        }
        for request in abandoned {
            request.finish(Err(EnrichError::ServiceStopped));
        }

        info!("enrichment service stopped");
    }

    /// Number of requests waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of futures handed out but not yet resolved.
    pub fn active(&self) -> usize {
        self.flight.active()
    }

    pub fn metrics(&self) -> EnrichmentMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn rate_limit(&self) -> RateLimitSnapshot {
        self.tracker.snapshot()
    }
}
