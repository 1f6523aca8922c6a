//! Request records and caller-facing completion futures.
//!
//! Every submitted request carries a one-shot completion channel and an
//! in-flight guard. Completion consumes the request, so a future can
//! resolve at most once; requeueing moves the intact record (same
//! channel) back to the queue tail. The guard keeps the quiescence
//! counter honest even when a record is dropped instead of completed,
//! as happens during teardown.

use crate::component::Component;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{oneshot, watch};
use url::Url;

/// How a successfully resolved request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// A definition payload was found (freshly fetched or cached) and
    /// annotation was attempted.
    Enriched,
    /// The resource is confirmed absent upstream; the component is
    /// untouched.
    Absent,
}

/// Terminal enrichment failures.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// The HTTP client could not be constructed.
    #[error("failed to initialize http client: {0}")]
    Client(#[from] reqwest::Error),

    /// The request kept failing with transport or server errors and ran
    /// out of attempts.
    #[error("enrichment of {uri} abandoned after {attempts} attempts")]
    RetriesExhausted { uri: String, attempts: u32 },

    /// The service was shut down before the request could complete.
    #[error("enrichment service stopped")]
    ServiceStopped,
}

pub type EnrichResult = Result<EnrichOutcome, EnrichError>;

/// Single-assignment future handed back by `submit`.
///
/// Resolves once with the request's terminal result. If the service is
/// torn down underneath a pending request, the future resolves with
/// [`EnrichError::ServiceStopped`].
#[derive(Debug)]
pub struct EnrichmentFuture {
    rx: oneshot::Receiver<EnrichResult>,
}

impl EnrichmentFuture {
    /// A future that is already resolved, for the synchronous cache
    /// paths.
    pub(crate) fn ready(result: EnrichResult) -> Self {
        let (tx, rx) = oneshot::channel();
        // The receiver is held right here; the send cannot fail.
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for EnrichmentFuture {
    type Output = EnrichResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|recv| match recv {
            Ok(result) => result,
            Err(_) => Err(EnrichError::ServiceStopped),
        })
    }
}

/// Count of futures handed out but not yet resolved.
///
/// Queued and executing requests both hold a [`FlightGuard`]; quiescence
/// is simply "the count is zero", which also covers requeued work.
#[derive(Debug)]
pub(crate) struct InFlight {
    count: watch::Sender<usize>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self {
            count: watch::channel(0).0,
        }
    }

    pub(crate) fn launch(this: &Arc<Self>) -> FlightGuard {
        this.count.send_modify(|c| *c += 1);
        FlightGuard(Arc::clone(this))
    }

    pub(crate) fn active(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until every outstanding future has resolved. Returns
    /// immediately when the system is already idle.
    pub(crate) async fn idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives as long as `self`; wait_for cannot fail here.
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

#[derive(Debug)]
pub(crate) struct FlightGuard(Arc<InFlight>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.count.send_modify(|c| *c -= 1);
    }
}

/// A pending enrichment: the component to annotate, the definition URI,
/// and the completion channel.
pub struct EnrichmentRequest {
    component: Arc<dyn Component>,
    uri: Url,
    attempts: u32,
    tx: oneshot::Sender<EnrichResult>,
    _guard: FlightGuard,
}

impl std::fmt::Debug for EnrichmentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentRequest")
            .field("uri", &self.uri.as_str())
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl EnrichmentRequest {
    pub(crate) fn new(
        component: Arc<dyn Component>,
        uri: Url,
        guard: FlightGuard,
    ) -> (Self, EnrichmentFuture) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                component,
                uri,
                attempts: 0,
                tx,
                _guard: guard,
            },
            EnrichmentFuture { rx },
        )
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub(crate) fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count one failed fetch attempt; returns the new total.
    pub(crate) fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Resolve the caller's future. Consumes the request, so a request
    /// can be finished at most once.
    pub(crate) fn finish(self, result: EnrichResult) {
        // The caller may have dropped its future; that is not an error.
        let _ = self.tx.send(result);
    }
}
