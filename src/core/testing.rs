//! In-memory transport for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::error::{SyncError, SyncResult};
use crate::core::http::Transport;

/// Serves canned bodies by URL, records every request and fails on demand.
/// Unknown URLs answer HTTP 404.
#[derive(Default)]
pub struct FakeTransport {
    bodies: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, url: &str) -> SyncResult<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(SyncError::Transport {
                url: url.to_string(),
                reason: "connection reset".into(),
            });
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn download_to_file(&self, url: &str, dest: &Path) -> SyncResult<u64> {
        let body = self.fetch(url).await?;
        std::fs::write(dest, &body).map_err(|source| SyncError::DownloadWrite {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(body.len() as u64)
    }
}

/// Lowercase hex SHA-1 of `bytes`.
pub fn sha1_hex(bytes: &[u8]) -> String {
    use sha1::{Digest, Sha1};
    hex::encode(Sha1::digest(bytes))
}
