//! In-memory content cache backend.

use crate::handler::{ContentError, ContentHandler};
use async_trait::async_trait;
use dashmap::DashMap;

/// Process-local [`ContentHandler`] over a concurrent map.
///
/// A `None` value is the negative marker. Nothing is persisted; this
/// backend is the default for tests and for one-shot runs that do not
/// want a cache directory.
#[derive(Debug, Default)]
pub struct MemoryContentHandler {
    entries: DashMap<String, Option<String>>,
}

impl MemoryContentHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, positive and negative.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ContentHandler for MemoryContentHandler {
    async fn get_content(&self, uri: &str) -> Result<String, ContentError> {
        match self.entries.get(uri) {
            Some(entry) => match entry.value() {
                Some(payload) => Ok(payload.clone()),
                None => Err(ContentError::Absent),
            },
            None => Err(ContentError::Miss),
        }
    }

    async fn save_content(&self, uri: &str, payload: Option<&str>) -> Result<(), ContentError> {
        self.entries
            .insert(uri.to_string(), payload.map(str::to_string));
        Ok(())
    }
}
