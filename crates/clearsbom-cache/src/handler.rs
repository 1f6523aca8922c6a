//! Backend-agnostic content cache interface.
//!
//! The enrichment engine consumes this trait and nothing else: a lookup
//! either yields a cached payload, reports the resource as confirmed
//! absent, or misses. Implementations must be thread-safe; the engine
//! calls them concurrently from the submission path and the worker pool.

use async_trait::async_trait;

/// Outcome classification for cache lookups and writes.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The URI carries a negative marker: the resource is known to be
    /// absent upstream and must not be fetched again.
    #[error("resource is confirmed absent")]
    Absent,

    /// No entry for the URI, positive or negative.
    #[error("no cache entry")]
    Miss,

    /// The backend failed. Callers treat this like a miss.
    #[error("cache backend error: {0}")]
    Io(#[from] std::io::Error),
}

/// URI-keyed content cache with negative-entry support.
#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// Look up the payload cached for `uri`.
    ///
    /// Returns `Ok(payload)` on a positive hit, [`ContentError::Absent`]
    /// when a negative marker exists, [`ContentError::Miss`] when the URI
    /// has never been observed, and [`ContentError::Io`] on backend
    /// failure.
    async fn get_content(&self, uri: &str) -> Result<String, ContentError>;

    /// Store an entry for `uri`.
    ///
    /// `Some(payload)` stores a positive entry; `None` stores a negative
    /// marker. Either replaces whatever was there before.
    async fn save_content(&self, uri: &str, payload: Option<&str>) -> Result<(), ContentError>;
}
