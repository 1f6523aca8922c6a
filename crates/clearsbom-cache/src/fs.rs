//! Persistent filesystem content cache backend.
//!
//! Layout: one file per URI under the cache root, named by the SHA-256
//! of the URI. `<key>.json` holds a positive payload; an empty
//! `<key>.absent` file is the negative marker. A concurrent in-memory
//! front tier absorbs repeat lookups so a warm read does no disk I/O.

use crate::handler::{ContentError, ContentHandler};
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Disk-backed [`ContentHandler`] with an in-memory front tier.
#[derive(Debug)]
pub struct FsContentHandler {
    root: PathBuf,
    front: DashMap<String, Option<String>>,
}

impl FsContentHandler {
    /// Open (creating if necessary) a cache rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ContentError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened content cache");
        Ok(Self {
            root,
            front: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key(uri: &str) -> String {
        hex::encode(Sha256::digest(uri.as_bytes()))
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn marker_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.absent"))
    }
}

#[async_trait]
impl ContentHandler for FsContentHandler {
    async fn get_content(&self, uri: &str) -> Result<String, ContentError> {
        if let Some(entry) = self.front.get(uri) {
            return match entry.value() {
                Some(payload) => Ok(payload.clone()),
                None => Err(ContentError::Absent),
            };
        }

        let key = Self::key(uri);
        match tokio::fs::read_to_string(self.payload_path(&key)).await {
            Ok(payload) => {
                self.front.insert(uri.to_string(), Some(payload.clone()));
                Ok(payload)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match tokio::fs::try_exists(self.marker_path(&key)).await {
                    Ok(true) => {
                        self.front.insert(uri.to_string(), None);
                        Err(ContentError::Absent)
                    }
                    Ok(false) => Err(ContentError::Miss),
                    Err(e) => Err(ContentError::Io(e)),
                }
            }
            Err(e) => Err(ContentError::Io(e)),
        }
    }

    async fn save_content(&self, uri: &str, payload: Option<&str>) -> Result<(), ContentError> {
        let key = Self::key(uri);
        match payload {
            Some(body) => {
                tokio::fs::write(self.payload_path(&key), body).await?;
                // A stale marker must not shadow the new payload.
                if let Err(e) = tokio::fs::remove_file(self.marker_path(&key)).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(uri = %uri, error = %e, "failed to clear stale absent marker");
                    }
                }
                self.front.insert(uri.to_string(), Some(body.to_string()));
            }
            None => {
                tokio::fs::write(self.marker_path(&key), b"").await?;
                self.front.insert(uri.to_string(), None);
            }
        }
        Ok(())
    }
}
