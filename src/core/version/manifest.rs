// ─── Version Manifest ───
// Parses the Mojang version manifest v2 and selects an entry from it.

use serde::Deserialize;

use crate::core::error::{SyncError, SyncResult};

/// Top-level Mojang version manifest.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub latest: Option<LatestVersions>,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    #[serde(rename = "releaseTime", default)]
    pub release_time: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    pub fn parse(bytes: &[u8]) -> SyncResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::upstream("version manifest", e))
    }

    /// Find a specific version entry by ID (e.g. "1.20.4"). First match in
    /// manifest order wins.
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Pick the entry for a user-supplied version string.
    ///
    /// `"latest"` is the first entry: the service publishes the manifest
    /// newest-first and that ordering is taken as given. `"latest-release"`
    /// and `"latest-snapshot"` go through the optional `latest` block.
    pub fn select(&self, version: &str) -> SyncResult<&VersionEntry> {
        let id: &str = match version {
            "latest" => {
                return self
                    .versions
                    .first()
                    .ok_or_else(|| SyncError::NotFound(version.to_string()))
            }
            "latest-release" => &self.latest_block()?.release,
            "latest-snapshot" => &self.latest_block()?.snapshot,
            other => other,
        };

        self.find_version(id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    fn latest_block(&self) -> SyncResult<&LatestVersions> {
        self.latest.as_ref().ok_or_else(|| SyncError::UpstreamFormat {
            document: "version manifest",
            reason: "no `latest` block".into(),
        })
    }
}
