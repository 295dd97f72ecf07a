use std::sync::Arc;

use tracing::info;

use crate::core::error::SyncResult;
use crate::core::http::Transport;

use super::manifest::VersionManifest;
use super::version_meta::VersionMeta;

/// Turns a version string into its fully resolved metadata document.
///
/// No retries here: without the manifest there is nothing to sync, so a
/// failed fetch surfaces straight to the caller.
pub struct ManifestResolver {
    transport: Arc<dyn Transport>,
    manifest_url: String,
}

impl ManifestResolver {
    pub fn new(transport: Arc<dyn Transport>, manifest_url: impl Into<String>) -> Self {
        Self {
            transport,
            manifest_url: manifest_url.into(),
        }
    }

    pub async fn fetch_manifest(&self) -> SyncResult<VersionManifest> {
        info!("Fetching version manifest...");
        let raw = self.transport.fetch(&self.manifest_url).await?;
        let manifest = VersionManifest::parse(&raw)?;
        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    pub async fn resolve(&self, version: &str) -> SyncResult<VersionMeta> {
        let manifest = self.fetch_manifest().await?;
        let entry = manifest.select(version)?;
        info!("Resolved {} -> {}", version, entry.id);

        let raw = self.transport.fetch(&entry.url).await?;
        VersionMeta::parse(&raw)
    }
}
