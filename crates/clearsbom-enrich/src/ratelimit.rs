//! Rate-limit state shared between workers and the dispatcher.
//!
//! Workers feed every response's headers through [`RateLimitTracker::observe`];
//! the dispatcher alone consults the state for admission decisions. Each
//! field is updated atomically on its own with last-writer-wins semantics;
//! no consistency is promised across the triple, and none is needed.

use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, error};

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Sentinel for "the server has not told us yet".
pub const UNKNOWN: i64 = -1;

/// Most recently observed rate-limit state.
///
/// `limit` and `remaining` are [`UNKNOWN`] until the first response
/// carries the headers; `reset_at_ms` is `0` until a reset instant has
/// been observed.
#[derive(Debug)]
pub struct RateLimitTracker {
    limit: AtomicI64,
    remaining: AtomicI64,
    reset_at_ms: AtomicI64,
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self {
            limit: AtomicI64::new(UNKNOWN),
            remaining: AtomicI64::new(UNKNOWN),
            reset_at_ms: AtomicI64::new(0),
        }
    }
}

/// Composite admission read: the dispatcher's view of the window.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    pub remaining: i64,
    pub reset_at_ms: i64,
}

impl Admission {
    /// Whether the window is exhausted. [`UNKNOWN`] remaining means no
    /// constraint is known and the next request is admissible.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Time until the window resets, if a reset instant is known and
    /// still in the future.
    pub fn until_reset(&self) -> Option<Duration> {
        if self.reset_at_ms <= 0 {
            return None;
        }
        let delta_ms = self.reset_at_ms - Utc::now().timestamp_millis();
        if delta_ms > 0 {
            Some(Duration::from_millis(delta_ms as u64))
        } else {
            None
        }
    }
}

/// Serializable view of the tracker for logs and status endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: i64,
    pub remaining: i64,
    pub reset_at_ms: i64,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the tracker from a response's headers.
    ///
    /// Missing headers leave their field untouched; non-integer values
    /// are logged and discarded. A `remaining` of zero also captures the
    /// reset instant when the server provides one.
    pub fn observe(&self, headers: &HeaderMap) {
        if let Some(limit) = int_header(headers, LIMIT_HEADER) {
            self.limit.store(limit, Ordering::Relaxed);
        }
        if let Some(remaining) = int_header(headers, REMAINING_HEADER) {
            self.remaining.store(remaining, Ordering::Relaxed);
            if remaining == 0 {
                if let Some(reset_secs) = int_header(headers, RESET_HEADER) {
                    self.reset_at_ms.store(reset_secs * 1000, Ordering::Relaxed);
                }
            }
        }
    }

    /// Force the window exhausted after a 429, optionally anchoring the
    /// reset `retry_after_secs` from now.
    pub fn mark_exhausted(&self, retry_after_secs: Option<i64>) {
        self.remaining.store(0, Ordering::Relaxed);
        if let Some(secs) = retry_after_secs {
            let reset = Utc::now().timestamp_millis() + secs * 1000;
            self.reset_at_ms.store(reset, Ordering::Relaxed);
        }
        debug!(retry_after_secs, "rate limit window marked exhausted");
    }

    /// Forget the remaining count after waiting out a reset, so the next
    /// response re-establishes ground truth.
    pub fn forget_remaining(&self) {
        self.remaining.store(UNKNOWN, Ordering::Relaxed);
    }

    /// The dispatcher's composite admission read.
    pub fn admission(&self) -> Admission {
        Admission {
            remaining: self.remaining.load(Ordering::Relaxed),
            reset_at_ms: self.reset_at_ms.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            limit: self.limit.load(Ordering::Relaxed),
            remaining: self.remaining.load(Ordering::Relaxed),
            reset_at_ms: self.reset_at_ms.load(Ordering::Relaxed),
        }
    }
}

fn int_header(headers: &HeaderMap, name: &str) -> Option<i64> {
    let value = headers.get(name)?;
    let text = match value.to_str() {
        Ok(t) => t,
        Err(e) => {
            error!(header = name, error = %e, "rate-limit header is not valid text");
            return None;
        }
    };
    match text.trim().parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            error!(header = name, value = text, "rate-limit header is not an integer");
            None
        }
    }
}
