use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sha1::{Digest, Sha1};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::core::error::{SyncError, SyncResult};
use crate::core::fs::write_atomic_async;
use crate::core::http::Transport;
use crate::core::progress::{emit, ObjectStatus, ProgressSink, SyncEvent};

/// Upper bound for a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A single file to download with optional SHA-1 for validation.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Label used in logs and progress events.
    pub name: String,
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Downloaded,
    /// Destination already held the expected content.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub name: String,
    pub error: String,
}

/// Aggregate result of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<JobFailure>,
}

impl BatchReport {
    pub fn record_failure(&mut self, name: impl Into<String>, error: &SyncError) {
        self.failed += 1;
        self.failures.push(JobFailure {
            name: name.into(),
            error: error.to_string(),
        });
    }
}

/// Concurrent, SHA-1 validated downloader backed by a fixed worker pool.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    /// Attempts per job, including the first.
    retries: u32,
    backoff: Duration,
    verify_hashes: bool,
    progress: Option<ProgressSink>,
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            concurrency: 8,
            retries: 3,
            backoff: Duration::from_millis(250),
            verify_hashes: true,
            progress: None,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.retries = attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn with_verification(mut self, verify_hashes: bool) -> Self {
        self.verify_hashes = verify_hashes;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    // ── Single file download ────────────────────────────

    /// Download one job to its destination.
    ///
    /// Skips the transfer when the destination already satisfies the job.
    /// Creates parent directories as needed and writes through a temporary
    /// sibling, so a failed job never leaves a truncated file behind.
    pub async fn download_file(&self, job: &DownloadJob) -> SyncResult<JobOutcome> {
        if self.is_satisfied(job).await {
            debug!("Up to date: {:?}", job.dest);
            return Ok(JobOutcome::Skipped);
        }

        let bytes = self.fetch_with_retry(&job.url).await?;

        if self.verify_hashes {
            if let Some(expected) = &job.sha1 {
                let actual = sha1_hex(&bytes);
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(SyncError::HashMismatch {
                        path: job.dest.clone(),
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
        }

        let write_err = |source| SyncError::DownloadWrite {
            path: job.dest.clone(),
            source,
        };
        if let Some(parent) = job.dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        write_atomic_async(&job.dest, &bytes)
            .await
            .map_err(write_err)?;

        debug!("Downloaded: {} -> {:?}", job.url, job.dest);
        Ok(JobOutcome::Downloaded)
    }

    async fn fetch_with_retry(&self, url: &str) -> SyncResult<Vec<u8>> {
        let mut attempt = 1;
        loop {
            let result = match self.transport.fetch(url).await {
                Ok(bytes) if bytes.is_empty() => Err(SyncError::EmptyBody {
                    url: url.to_string(),
                }),
                other => other,
            };

            match result {
                Err(err) if err.is_transient() && attempt < self.retries => {
                    let delay = self.retry_delay(attempt);
                    debug!("Retrying {} in {:?} ({})", url, delay, err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Exponential backoff before attempt `attempt + 1`, capped at [`MAX_BACKOFF`].
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Whether `job.dest` already holds the expected object.
    ///
    /// With verification on and a known hash the file content is checked;
    /// otherwise the size is compared when known.
    pub async fn is_satisfied(&self, job: &DownloadJob) -> bool {
        let Ok(metadata) = tokio::fs::metadata(&job.dest).await else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }

        match (&job.sha1, job.size) {
            (Some(expected), _) if self.verify_hashes => {
                Self::validate_sha1(&job.dest, expected).await.unwrap_or(false)
            }
            (_, Some(size)) => metadata.len() == size,
            _ => true,
        }
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download every job with at most `concurrency` transfers in flight.
    ///
    /// Workers pull from a shared queue until it is empty. A failed job is
    /// logged and counted; it never stops the batch.
    pub async fn download_batch(self: &Arc<Self>, jobs: Vec<DownloadJob>) -> BatchReport {
        let total = jobs.len();
        let worker_count = self.concurrency.min(total);
        info!(
            "Starting batch download: {} files, concurrency={}",
            total, worker_count
        );
        emit(&self.progress, SyncEvent::ObjectsQueued { total });

        let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
        let counters = Arc::new(Counters::default());

        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            let downloader = Arc::clone(self);
            let queue = Arc::clone(&queue);
            let counters = Arc::clone(&counters);
            workers.spawn(async move { downloader.run_worker(queue, counters, total).await });
        }

        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(failures) => report.failures.extend(failures),
                Err(e) => warn!("Download worker aborted: {}", e),
            }
        }

        report.downloaded = counters.downloaded.load(Ordering::Relaxed);
        report.skipped = counters.skipped.load(Ordering::Relaxed);
        report.failed = counters.failed.load(Ordering::Relaxed);
        // Jobs left behind by an aborted worker are failures too.
        let unfinished = queue.lock().await.len();
        report.failed += unfinished;

        info!(
            "Batch finished: {} downloaded, {} up to date, {} failed",
            report.downloaded, report.skipped, report.failed
        );
        report
    }

    async fn run_worker(
        &self,
        queue: Arc<Mutex<VecDeque<DownloadJob>>>,
        counters: Arc<Counters>,
        total: usize,
    ) -> Vec<JobFailure> {
        let mut failures = Vec::new();
        loop {
            let Some(job) = queue.lock().await.pop_front() else {
                break;
            };

            let status = match self.download_file(&job).await {
                Ok(JobOutcome::Downloaded) => {
                    counters.downloaded.fetch_add(1, Ordering::Relaxed);
                    ObjectStatus::Downloaded
                }
                Ok(JobOutcome::Skipped) => {
                    counters.skipped.fetch_add(1, Ordering::Relaxed);
                    ObjectStatus::Skipped
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", job.name, e);
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    failures.push(JobFailure {
                        name: job.name.clone(),
                        error: e.to_string(),
                    });
                    ObjectStatus::Failed
                }
            };

            let completed = counters.finished.fetch_add(1, Ordering::Relaxed) + 1;
            emit(
                &self.progress,
                SyncEvent::ObjectFinished {
                    name: job.name,
                    status,
                    completed,
                    total,
                },
            );
        }
        failures
    }

    /// Validate an existing file's SHA-1.
    pub async fn validate_sha1(path: &Path, expected: &str) -> SyncResult<bool> {
        Ok(Self::file_sha1(path).await?.eq_ignore_ascii_case(expected))
    }

    pub async fn file_sha1(path: &Path) -> SyncResult<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| SyncError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(sha1_hex(&bytes))
    }
}

#[derive(Default)]
struct Counters {
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    finished: AtomicUsize,
}

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{sha1_hex as digest, FakeTransport};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    fn downloader(transport: Arc<FakeTransport>) -> Arc<Downloader> {
        Arc::new(
            Downloader::new(transport)
                .with_concurrency(4)
                .with_retries(3, Duration::from_millis(1)),
        )
    }

    fn job(dir: &Path, name: &str, body: &str) -> DownloadJob {
        DownloadJob {
            name: name.to_string(),
            url: format!("https://cdn.test/{name}"),
            dest: dir.join(name),
            sha1: Some(digest(body.as_bytes())),
            size: Some(body.len() as u64),
        }
    }

    #[tokio::test]
    async fn downloads_and_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new().with("https://cdn.test/a/b/c.txt", "hello"));
        let job = job(tmp.path(), "a/b/c.txt", "hello");

        let outcome = downloader(transport).download_file(&job).await.unwrap();

        assert_eq!(outcome, JobOutcome::Downloaded);
        assert_eq!(std::fs::read(&job.dest).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn hash_mismatch_is_rejected_and_nothing_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new().with("https://cdn.test/x", "tampered"));
        let job = job(tmp.path(), "x", "original");

        let err = downloader(transport).download_file(&job).await.unwrap_err();

        assert!(matches!(err, SyncError::HashMismatch { .. }));
        assert!(!job.dest.exists());
    }

    #[tokio::test]
    async fn empty_body_is_retried_then_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new().with("https://cdn.test/e", ""));
        let job = job(tmp.path(), "e", "");

        let err = downloader(transport.clone())
            .download_file(&job)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::EmptyBody { .. }));
        assert_eq!(transport.request_count("https://cdn.test/e"), 3);
    }

    #[tokio::test]
    async fn missing_object_is_not_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let job = job(tmp.path(), "gone", "x");

        let err = downloader(transport.clone())
            .download_file(&job)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::HttpStatus { status: 404, .. }));
        assert_eq!(transport.request_count("https://cdn.test/gone"), 1);
    }

    #[tokio::test]
    async fn write_failure_is_download_write_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("file"), b"not a directory").unwrap();
        let transport = Arc::new(FakeTransport::new().with("https://cdn.test/file/x", "x"));
        let job = job(tmp.path(), "file/x", "x");

        let err = downloader(transport).download_file(&job).await.unwrap_err();

        assert!(matches!(err, SyncError::DownloadWrite { .. }));
    }

    #[tokio::test]
    async fn existing_valid_file_is_skipped_without_request() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let job = job(tmp.path(), "cached", "cached body");
        std::fs::write(&job.dest, "cached body").unwrap();

        let outcome = downloader(transport.clone())
            .download_file(&job)
            .await
            .unwrap();

        assert_eq!(outcome, JobOutcome::Skipped);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn existing_corrupt_file_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let transport =
            Arc::new(FakeTransport::new().with("https://cdn.test/stale", "fresh body"));
        let job = job(tmp.path(), "stale", "fresh body");
        std::fs::write(&job.dest, "rotten body").unwrap();

        let outcome = downloader(transport).download_file(&job).await.unwrap();

        assert_eq!(outcome, JobOutcome::Downloaded);
        assert_eq!(std::fs::read(&job.dest).unwrap(), b"fresh body");
    }

    #[tokio::test]
    async fn size_check_is_used_when_verification_is_off() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let mut job = job(tmp.path(), "sized", "12345");
        job.sha1 = Some("0000".into());
        std::fs::write(&job.dest, "abcde").unwrap();

        let downloader = Downloader::new(transport.clone()).with_verification(false);

        assert!(downloader.is_satisfied(&job).await);
        std::fs::write(&job.dest, "abc").unwrap();
        assert!(!downloader.is_satisfied(&job).await);
    }

    #[tokio::test]
    async fn batch_counts_failures_and_keeps_going() {
        let tmp = tempfile::tempdir().unwrap();
        let mut transport = FakeTransport::new().failing("https://cdn.test/obj3");
        let mut jobs = Vec::new();
        for i in 0..10 {
            let name = format!("obj{i}");
            let body = format!("body {i}");
            transport = transport.with(&format!("https://cdn.test/{name}"), body.clone());
            jobs.push(job(tmp.path(), &name, &body));
        }

        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let sink: ProgressSink = Arc::new(move |event: SyncEvent| sink_events.lock().unwrap().push(event));
        let downloader = Arc::new(
            Downloader::new(Arc::new(transport))
                .with_concurrency(3)
                .with_retries(2, Duration::from_millis(1))
                .with_progress(Some(sink)),
        );

        let report = downloader.download_batch(jobs).await;

        assert_eq!(report.total, 10);
        assert_eq!(report.downloaded, 9);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].name, "obj3");
        assert!(!tmp.path().join("obj3").exists());
        assert_eq!(std::fs::read(tmp.path().join("obj7")).unwrap(), b"body 7");

        let events = events.lock().unwrap();
        assert_eq!(events[0], SyncEvent::ObjectsQueued { total: 10 });
        let finished = events
            .iter()
            .filter(|e| matches!(e, SyncEvent::ObjectFinished { .. }))
            .count();
        assert_eq!(finished, 10);
        assert!(events.iter().any(|e| matches!(
            e,
            SyncEvent::ObjectFinished { completed: 10, total: 10, .. }
        )));
    }

    #[tokio::test]
    async fn empty_batch_spawns_no_workers() {
        let downloader = downloader(Arc::new(FakeTransport::new()));
        let report = downloader.download_batch(Vec::new()).await;
        assert_eq!(report, BatchReport::default());
    }

    #[test]
    fn retry_delay_doubles_and_is_capped() {
        let downloader = Downloader::new(Arc::new(FakeTransport::new()))
            .with_retries(3, Duration::from_millis(250));

        assert_eq!(downloader.retry_delay(1), Duration::from_millis(250));
        assert_eq!(downloader.retry_delay(3), Duration::from_secs(1));
        assert_eq!(downloader.retry_delay(20), MAX_BACKOFF);
        assert_eq!(downloader.retry_delay(u32::MAX), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn large_retry_count_exhausts_without_overflow() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new().failing("https://cdn.test/flaky"));
        let downloader = Downloader::new(transport.clone()).with_retries(40, Duration::ZERO);
        let job = job(tmp.path(), "flaky", "x");

        let err = downloader.download_file(&job).await.unwrap_err();

        assert!(matches!(err, SyncError::Transport { .. }));
        assert_eq!(transport.request_count("https://cdn.test/flaky"), 40);
    }

    /// Answers every fetch after a short delay and records the peak number
    /// of fetches running at once.
    #[derive(Default)]
    struct SlowTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn fetch(&self, url: &str) -> SyncResult<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(url.as_bytes().to_vec())
        }

        async fn download_to_file(&self, url: &str, _dest: &Path) -> SyncResult<u64> {
            Err(SyncError::Transport {
                url: url.to_string(),
                reason: "not supported".into(),
            })
        }
    }

    #[tokio::test]
    async fn batch_never_exceeds_concurrency() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(SlowTransport::default());
        let jobs: Vec<DownloadJob> = (0..24)
            .map(|i| DownloadJob {
                name: format!("obj{i}"),
                url: format!("https://cdn.test/obj{i}"),
                dest: tmp.path().join(format!("obj{i}")),
                sha1: None,
                size: None,
            })
            .collect();
        let downloader = Arc::new(Downloader::new(transport.clone()).with_concurrency(3));

        let report = downloader.download_batch(jobs).await;

        assert_eq!(report.downloaded, 24);
        let peak = transport.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeds 3");
        assert!(peak > 1, "downloads never overlapped");
    }
}
