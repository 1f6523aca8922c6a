//! # ClearSBOM Enrich
//!
//! Rate-limit-aware enrichment engine: fetches component metadata from
//! ClearlyDefined, annotates SBOM components with the declared license,
//! and paces itself against the service's response-header rate limits.
//!
//! Requests flow through a single dispatcher task that admits work to a
//! bounded worker pool only while rate-limit capacity is available.
//! Responses feed the tracker; 429s and transient failures requeue at
//! the tail; 200/404 results land in the shared content cache so later
//! runs never repeat the round trip.
//!
//! ## Quick start
//!
//! ```no_run
//! use clearsbom_cache::MemoryContentHandler;
//! use clearsbom_enrich::prelude::*;
//! use std::sync::Arc;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EnrichError> {
//!     let cache = Arc::new(MemoryContentHandler::new());
//!     let service = EnrichmentService::new(EnrichmentConfig::default(), cache).await?;
//!
//!     let component = Arc::new(SimpleComponent::new("org.example:widget"));
//!     let uri = Url::parse(
//!         "https://api.clearlydefined.io/definitions/maven/mavencentral/org.example/widget/1.0",
//!     )
//!     .unwrap();
//!
//!     let outcome = service.submit(component.clone(), uri).await.await?;
//!     println!("{outcome:?} license={:?}", component.property("clearly-defined"));
//!
//!     service.wait_for_completion().await;
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod component;
pub mod config;
pub mod dispatcher;
pub mod license;
pub mod metrics;
pub mod queue;
pub mod ratelimit;
pub mod request;
pub mod service;
pub mod worker;

pub use component::{Component, SimpleComponent};
pub use config::EnrichmentConfig;
pub use license::DECLARED_LICENSE_PROPERTY;
pub use metrics::{EnrichmentMetrics, EnrichmentMetricsSnapshot};
pub use ratelimit::{RateLimitSnapshot, RateLimitTracker};
pub use request::{EnrichError, EnrichOutcome, EnrichmentFuture};
pub use service::EnrichmentService;

/// Re-export of the commonly used surface.
pub mod prelude {
    pub use crate::component::{Component, SimpleComponent};
    pub use crate::config::EnrichmentConfig;
    pub use crate::request::{EnrichError, EnrichOutcome};
    pub use crate::service::EnrichmentService;
    pub use clearsbom_cache::{ContentError, ContentHandler};
}
