//! Request execution.
//!
//! A worker performs exactly one GET per admitted request, feeds the
//! response headers to the rate-limit tracker, and classifies the
//! outcome. 200 and 404 are terminal (and land in the content cache);
//! 429 requeues under dispatcher pacing without consuming an attempt;
//! everything else, including transport errors, requeues until the
//! attempt bound runs out.

use crate::license;
use crate::metrics::EnrichmentMetrics;
use crate::queue::RequestQueue;
use crate::ratelimit::RateLimitTracker;
use crate::request::{EnrichError, EnrichOutcome, EnrichmentRequest};
use clearsbom_cache::ContentHandler;
use reqwest::StatusCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub(crate) struct Worker {
    client: reqwest::Client,
    content: Arc<dyn ContentHandler>,
    tracker: Arc<RateLimitTracker>,
    queue: Arc<RequestQueue>,
    metrics: Arc<EnrichmentMetrics>,
    max_attempts: u32,
}

impl Worker {
    pub(crate) fn new(
        client: reqwest::Client,
        content: Arc<dyn ContentHandler>,
        tracker: Arc<RateLimitTracker>,
        queue: Arc<RequestQueue>,
        metrics: Arc<EnrichmentMetrics>,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            content,
            tracker,
            queue,
            metrics,
            max_attempts,
        }
    }

    pub(crate) async fn execute(&self, request: EnrichmentRequest) {
        let uri = request.uri().clone();
        let response = match self.client.get(uri.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(uri = %uri, error = %e, "definition fetch failed");
                self.retry_later(request);
                return;
            }
        };

        self.tracker.observe(response.headers());

        match response.status() {
            StatusCode::OK => match response.text().await {
                Ok(body) => self.complete_enriched(request, &body).await,
                Err(e) => {
                    warn!(uri = %uri, error = %e, "failed to read definition body");
                    self.retry_later(request);
                }
            },
            StatusCode::NOT_FOUND => self.complete_absent(request).await,
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = retry_after_secs(response.headers());
                self.tracker.mark_exhausted(retry_after);
                debug!(uri = %uri, ?retry_after, "throttled by server; requeueing");
                self.metrics.rate_limit_requeues.fetch_add(1, Ordering::Relaxed);
                // Not a failed attempt: the dispatcher paces the retry.
                self.queue.offer(request);
            }
            status => {
                warn!(uri = %uri, status = status.as_u16(), "unexpected definition response");
                self.retry_later(request);
            }
        }
    }

    async fn complete_enriched(&self, request: EnrichmentRequest, body: &str) {
        let uri = request.uri().as_str();
        if let Err(e) = self.content.save_content(uri, Some(body)).await {
            error!(uri = %uri, error = %e, "failed to cache definition payload");
        }
        license::annotate(request.component(), body);
        self.metrics.fetched.fetch_add(1, Ordering::Relaxed);
        request.finish(Ok(EnrichOutcome::Enriched));
    }

    async fn complete_absent(&self, request: EnrichmentRequest) {
        let uri = request.uri().as_str();
        debug!(uri = %uri, "definition confirmed absent");
        if let Err(e) = self.content.save_content(uri, None).await {
            error!(uri = %uri, error = %e, "failed to cache absent marker");
        }
        self.metrics.absent.fetch_add(1, Ordering::Relaxed);
        request.finish(Ok(EnrichOutcome::Absent));
    }

    /// Requeue after a transport or server failure, abandoning the
    /// request once its attempts are spent.
    fn retry_later(&self, mut request: EnrichmentRequest) {
        let attempts = request.record_attempt();
        if attempts >= self.max_attempts {
            let uri = request.uri().to_string();
            error!(uri = %uri, attempts, "abandoning enrichment after repeated failures");
            self.metrics.abandoned.fetch_add(1, Ordering::Relaxed);
            request.finish(Err(EnrichError::RetriesExhausted { uri, attempts }));
        } else {
            debug!(uri = %request.uri(), attempts, "requeueing after failure");
            self.metrics.transport_requeues.fetch_add(1, Ordering::Relaxed);
            self.queue.offer(request);
        }
    }
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
