//! # ClearSBOM Cache
//!
//! URI-keyed content cache shared between the enrichment engine and the
//! rest of the SBOM pipeline. Every entry is in one of three states:
//!
//! - **positive**: the payload fetched for the URI
//! - **negative**: the resource is confirmed absent upstream; a marker
//!   suppresses future network requests for that URI
//! - **missing**: the URI has never been observed
//!
//! ## Backends
//!
//! - [`MemoryContentHandler`]: process-local, no persistence
//! - [`FsContentHandler`]: one file per URI on disk with an in-memory
//!   front tier, so entries survive across runs

pub mod fs;
pub mod handler;
pub mod memory;

pub use fs::FsContentHandler;
pub use handler::{ContentError, ContentHandler};
pub use memory::MemoryContentHandler;
