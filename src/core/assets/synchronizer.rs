use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::downloader::{BatchReport, DownloadJob, Downloader};
use crate::core::error::SyncResult;
use crate::core::fs::relative_path;
use crate::core::http::Transport;

use super::asset_index::AssetIndex;

/// Manages resource object downloads (sounds, textures, lang files named by
/// an asset index).
pub struct ResourceSynchronizer {
    transport: Arc<dyn Transport>,
    downloader: Arc<Downloader>,
    /// CDN root, ending with `/`.
    base_url: String,
}

impl ResourceSynchronizer {
    pub fn new(
        transport: Arc<dyn Transport>,
        downloader: Arc<Downloader>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            transport,
            downloader,
            base_url,
        }
    }

    pub async fn fetch_index(&self, index_url: &str) -> SyncResult<AssetIndex> {
        info!("Fetching asset index {}", index_url);
        let raw = self.transport.fetch(index_url).await?;
        let index = AssetIndex::parse(&raw)?;
        info!("Asset index lists {} objects", index.len());
        Ok(index)
    }

    /// One job per object, destined for `dest_root/<name>`. Names that would
    /// escape `dest_root` are recorded as failures in the returned report.
    pub fn plan(&self, index: &AssetIndex, dest_root: &Path) -> (Vec<DownloadJob>, BatchReport) {
        let mut rejected = BatchReport::default();
        let mut jobs: Vec<DownloadJob> = Vec::with_capacity(index.len());

        for (name, obj) in &index.objects {
            let rel = match relative_path(name) {
                Ok(rel) => rel,
                Err(e) => {
                    warn!("Skipping asset: {}", e);
                    rejected.record_failure(name.as_str(), &e);
                    continue;
                }
            };
            jobs.push(DownloadJob {
                name: name.clone(),
                url: obj.url(&self.base_url),
                dest: dest_root.join(rel),
                sha1: Some(obj.hash.to_ascii_lowercase()),
                size: Some(obj.size),
            });
        }

        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        rejected.total = rejected.failed;
        (jobs, rejected)
    }

    /// Fetch the index at `index_url` and retrieve every object it lists.
    ///
    /// Only a failure to obtain the index is an error; individual objects
    /// are counted in the report.
    pub async fn sync(&self, index_url: &str, dest_root: &Path) -> SyncResult<BatchReport> {
        let index = self.fetch_index(index_url).await?;
        let (jobs, rejected) = self.plan(&index, dest_root);

        let mut report = self.downloader.download_batch(jobs).await;
        report.total += rejected.total;
        report.failed += rejected.failed;
        report.failures.extend(rejected.failures);
        Ok(report)
    }
}
