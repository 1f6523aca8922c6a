//! FIFO queue of pending enrichment requests.
//!
//! Unbounded, thread-safe for producers; consumed by the single
//! dispatcher task. Initial submissions keep their order; a requeued
//! request is appended at the tail and loses its original position.

use crate::request::EnrichmentRequest;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct RequestQueue {
    inner: Mutex<VecDeque<EnrichmentRequest>>,
    notify: Notify,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail. Used for both initial submission and requeue.
    pub fn offer(&self, request: EnrichmentRequest) {
        self.inner.lock().push_back(request);
        self.notify.notify_one();
    }

    /// Remove and return the head, waiting up to `timeout` for one to
    /// arrive.
    ///
    /// Single-consumer: `notify_one` stores exactly one wake-up permit,
    /// which is enough for the one dispatcher but not for competing
    /// pollers.
    pub async fn poll(&self, timeout: Duration) -> Option<EnrichmentRequest> {
        tokio::time::timeout(timeout, self.recv()).await.ok()
    }

    async fn recv(&self) -> EnrichmentRequest {
        loop {
            if let Some(request) = self.inner.lock().pop_front() {
                return request;
            }
            self.notify.notified().await;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Take everything still queued. Used during teardown to resolve
    /// abandoned requests.
    pub fn drain(&self) -> Vec<EnrichmentRequest> {
        self.inner.lock().drain(..).collect()
    }
}
