// ─── Version Meta ───
// The per-version document. Only the two URLs the sync needs are required.

use serde::Deserialize;

use crate::core::error::{SyncError, SyncResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMeta {
    #[serde(default)]
    pub id: Option<String>,
    pub downloads: VersionDownloads,
    pub asset_index: AssetIndexInfo,
}

#[derive(Debug, Deserialize)]
pub struct VersionDownloads {
    pub client: DownloadArtifact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

impl VersionMeta {
    pub fn parse(bytes: &[u8]) -> SyncResult<Self> {
        let meta: VersionMeta =
            serde_json::from_slice(bytes).map_err(|e| SyncError::upstream("version meta", e))?;

        if meta.downloads.client.url.is_empty() {
            return Err(SyncError::upstream("version meta", "empty downloads.client.url"));
        }
        if meta.asset_index.url.is_empty() {
            return Err(SyncError::upstream("version meta", "empty assetIndex.url"));
        }
        Ok(meta)
    }

    pub fn client_url(&self) -> &str {
        &self.downloads.client.url
    }

    pub fn asset_index_url(&self) -> &str {
        &self.asset_index.url
    }
}
