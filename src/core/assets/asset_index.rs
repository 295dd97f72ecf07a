use std::collections::HashMap;

use serde::Deserialize;

use crate::core::error::{SyncError, SyncResult};

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetIndex {
    /// Decode and validate an asset index document. Every hash must be hex
    /// and long enough to name its CDN bucket.
    pub fn parse(bytes: &[u8]) -> SyncResult<Self> {
        let index: AssetIndex =
            serde_json::from_slice(bytes).map_err(|e| SyncError::upstream("asset index", e))?;

        if let Some((name, _)) = index.objects.iter().find(|(_, obj)| !obj.has_valid_hash()) {
            return Err(SyncError::upstream(
                "asset index",
                format!("object {name} has an invalid hash"),
            ));
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl AssetObject {
    fn has_valid_hash(&self) -> bool {
        self.hash.len() >= 2 && self.hash.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Two-character CDN bucket the object lives in. A hash too short to
    /// carry one (only possible for hand-built objects) is its own bucket.
    pub fn bucket(&self) -> &str {
        self.hash.get(..2).unwrap_or(&self.hash)
    }

    /// `base_url` must end with `/`.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}/{}", base_url, self.bucket(), self.hash)
    }
}
