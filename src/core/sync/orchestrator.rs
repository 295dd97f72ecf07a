// ─── Orchestrator ───
// Sequences resolution, archive extraction and resource download for the
// two public entry points.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::archive::{ArchiveExtractor, ExtractReport};
use crate::core::assets::ResourceSynchronizer;
use crate::core::config::SyncConfig;
use crate::core::downloader::{BatchReport, Downloader};
use crate::core::error::{SyncError, SyncResult};
use crate::core::fs::{create_dir_all, remove_tree};
use crate::core::http::{HttpTransport, Transport};
use crate::core::progress::{emit, ProgressSink, Stage, SyncEvent};
use crate::core::version::{ManifestResolver, VersionEntry, VersionMeta};

/// Subtree of the client jar holding the bundled assets.
pub const ASSETS_PREFIX: &str = "assets/minecraft";
pub const MINECRAFT_DIR: &str = "minecraft";
pub const RESOURCES_DIR: &str = "resources";
const CLIENT_ARCHIVE: &str = "client.jar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Assets,
    Resources,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Assets => f.write_str("assets"),
            Task::Resources => f.write_str("resources"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetsReport {
    pub version: Option<String>,
    pub archive_bytes: u64,
    pub extract: ExtractReport,
}

/// Terminal status of an entry point.
#[derive(Debug)]
pub enum SyncOutcome {
    Assets(AssetsReport),
    Resources(BatchReport),
    Failed { task: Task, error: SyncError },
}

impl SyncOutcome {
    /// Completed with no per-item failures.
    pub fn is_success(&self) -> bool {
        match self {
            SyncOutcome::Assets(report) => report.extract.failed == 0,
            SyncOutcome::Resources(report) => report.failed == 0,
            SyncOutcome::Failed { .. } => false,
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Assets(r) => write!(
                f,
                "assets: {} files extracted, {} failed",
                r.extract.files_written, r.extract.failed
            ),
            SyncOutcome::Resources(r) => write!(
                f,
                "resources: {} downloaded, {} up to date, {} failed (of {})",
                r.downloaded, r.skipped, r.failed, r.total
            ),
            SyncOutcome::Failed { task, error } => write!(f, "{task}: failed: {error}"),
        }
    }
}

pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    config: SyncConfig,
    progress: Option<ProgressSink>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>, config: SyncConfig) -> Self {
        Self {
            transport,
            config,
            progress: None,
        }
    }

    /// Orchestrator over the real HTTP transport.
    pub fn from_config(config: SyncConfig) -> SyncResult<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn resolver(&self) -> ManifestResolver {
        ManifestResolver::new(Arc::clone(&self.transport), self.config.manifest_url.as_str())
    }

    fn synchronizer(&self) -> ResourceSynchronizer {
        let downloader = Downloader::new(Arc::clone(&self.transport))
            .with_concurrency(self.config.concurrency)
            .with_retries(self.config.retries, std::time::Duration::from_millis(250))
            .with_verification(self.config.verify_hashes)
            .with_progress(self.progress.clone());
        ResourceSynchronizer::new(
            Arc::clone(&self.transport),
            Arc::new(downloader),
            self.config.resources_url.as_str(),
        )
    }

    /// Manifest entries, newest first.
    pub async fn list_versions(&self) -> SyncResult<Vec<VersionEntry>> {
        Ok(self.resolver().fetch_manifest().await?.versions)
    }

    // ── Entry points ────────────────────────────────────

    /// Extract the client jar's `assets/minecraft` tree into
    /// `<base>/minecraft`. Never fails; the outcome carries any error.
    pub async fn get_assets(&self, version: &str, base: &Path) -> SyncOutcome {
        info!("Getting assets for {}...", version);
        match self.sync_assets(version, base).await {
            Ok(report) => {
                info!("Done getting assets!");
                SyncOutcome::Assets(report)
            }
            Err(error) => {
                error!("Asset sync failed: {}", error);
                SyncOutcome::Failed {
                    task: Task::Assets,
                    error,
                }
            }
        }
    }

    /// Download every resource object of the version's asset index into
    /// `<base>/resources`. Never fails; the outcome carries any error.
    pub async fn get_resources(&self, version: &str, base: &Path) -> SyncOutcome {
        info!("Getting resources for {}...", version);
        match self.sync_resources(version, base).await {
            Ok(report) => {
                info!("Done getting resources!");
                SyncOutcome::Resources(report)
            }
            Err(error) => {
                error!("Resource sync failed: {}", error);
                SyncOutcome::Failed {
                    task: Task::Resources,
                    error,
                }
            }
        }
    }

    // ── Pipelines ───────────────────────────────────────

    pub async fn sync_assets(&self, version: &str, base: &Path) -> SyncResult<AssetsReport> {
        let target = base.join(MINECRAFT_DIR);
        remove_tree(&target).await?;

        emit(&self.progress, SyncEvent::Stage(Stage::Resolving));
        let meta = self.resolver().resolve(version).await?;

        create_dir_all(base).await?;
        let archive = base.join(CLIENT_ARCHIVE);
        let result = self.extract_client(&meta, &archive, &target).await;

        // The temporary archive goes away whatever happened above.
        if let Err(e) = tokio::fs::remove_file(&archive).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {:?}: {}", archive, e);
            }
        }
        result
    }

    async fn extract_client(
        &self,
        meta: &VersionMeta,
        archive: &Path,
        target: &Path,
    ) -> SyncResult<AssetsReport> {
        emit(&self.progress, SyncEvent::Stage(Stage::DownloadingArchive));
        info!("Downloading {}...", CLIENT_ARCHIVE);
        let archive_bytes = self
            .transport
            .download_to_file(meta.client_url(), archive)
            .await?;
        emit(
            &self.progress,
            SyncEvent::ArchiveDownloaded {
                bytes: archive_bytes,
            },
        );

        if self.config.verify_hashes {
            if let Some(expected) = &meta.downloads.client.sha1 {
                let actual = Downloader::file_sha1(archive).await?;
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(SyncError::HashMismatch {
                        path: archive.to_path_buf(),
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
        }

        emit(&self.progress, SyncEvent::Stage(Stage::Extracting));
        let extract = ArchiveExtractor::new(ASSETS_PREFIX)
            .extract_blocking(archive.to_path_buf(), target.to_path_buf())
            .await?;

        Ok(AssetsReport {
            version: meta.id.clone(),
            archive_bytes,
            extract,
        })
    }

    pub async fn sync_resources(&self, version: &str, base: &Path) -> SyncResult<BatchReport> {
        let target = base.join(RESOURCES_DIR);
        if self.config.clean {
            remove_tree(&target).await?;
        }

        emit(&self.progress, SyncEvent::Stage(Stage::Resolving));
        let meta = self.resolver().resolve(version).await?;

        emit(&self.progress, SyncEvent::Stage(Stage::FetchingIndex));
        self.synchronizer()
            .sync(meta.asset_index_url(), &target)
            .await
    }
}
