use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Enrichment engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Number of concurrent workers performing HTTP fetches.
    pub worker_count: usize,
    /// How long the dispatcher waits on an empty queue per iteration.
    pub queue_poll_interval: Duration,
    /// Maximum fetch attempts per request before it is abandoned with a
    /// terminal error. 429 responses do not count against this bound.
    pub max_attempts: u32,
    /// Cap on the back-off applied when a request is requeued because
    /// the rate-limit window is exhausted.
    pub rate_limit_backoff_cap: Duration,
    /// Back-off applied on an exhausted window whose reset instant is
    /// unknown or already past.
    pub requeue_backoff: Duration,
    /// How long `shutdown` waits for in-flight workers to finish.
    pub shutdown_grace: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// TCP connect timeout for the HTTP client.
    pub connect_timeout: Duration,
    /// Total per-request timeout for the HTTP client.
    pub request_timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            queue_poll_interval: Duration::from_secs(1),
            max_attempts: 5,
            rate_limit_backoff_cap: Duration::from_secs(5),
            requeue_backoff: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
            user_agent: format!("clearsbom/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(20),
        }
    }
}
