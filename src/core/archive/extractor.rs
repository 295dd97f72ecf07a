// ─── Archive Extractor ───
// Pulls one prefixed subtree out of a zip archive (the client jar) and
// rebuilds it under a destination root.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::error::{SyncError, SyncResult};
use crate::core::fs::{relative_path, write_atomic};

/// Largest buffer reserved up front from an entry's declared size.
const MAX_PREALLOC: u64 = 16 << 20;

/// Counts for one extraction run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub files_written: usize,
    /// Entries outside the prefix and directory records.
    pub skipped: usize,
    /// Entries under the prefix that could not be written.
    pub failed: usize,
    pub bytes_written: u64,
}

/// Extracts the subtree of an archive whose entry names live under `prefix`.
pub struct ArchiveExtractor {
    prefix: String,
}

impl ArchiveExtractor {
    /// A trailing `/` on `prefix` is ignored.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Remainder of `name` below the prefix, or `None` when `name` is not
    /// inside it. The character after the prefix must be a separator, so
    /// `assets/minecraftx/b.txt` is not under `assets/minecraft`.
    pub fn strip_prefix<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(name);
        }
        name.strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')
            .filter(|rest| !rest.is_empty())
    }

    /// Extract every file under the prefix into `dest_root`.
    ///
    /// The archive handle lives only inside this call. A per-file write
    /// failure is logged and counted; an unreadable archive aborts.
    pub fn extract(&self, archive_path: &Path, dest_root: &Path) -> SyncResult<ExtractReport> {
        let open_err = |reason: String| SyncError::ArchiveOpen {
            path: archive_path.to_path_buf(),
            reason,
        };
        let read_err = |reason: String| SyncError::ArchiveRead {
            path: archive_path.to_path_buf(),
            reason,
        };

        let file = File::open(archive_path).map_err(|e| open_err(e.to_string()))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| open_err(e.to_string()))?;

        info!(
            "Extracting '{}' from {:?} ({} entries)",
            self.prefix,
            archive_path,
            archive.len()
        );

        let mut report = ExtractReport::default();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| read_err(e.to_string()))?;
            let name = entry.name().to_string();

            let Some(rest) = self.strip_prefix(&name) else {
                report.skipped += 1;
                continue;
            };
            if entry.is_dir() || rest.ends_with('/') {
                report.skipped += 1;
                continue;
            }

            let dest = match relative_path(rest) {
                Ok(rel) => dest_root.join(rel),
                Err(e) => {
                    warn!("Skipping archive entry: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            let mut contents = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
            entry
                .read_to_end(&mut contents)
                .map_err(|e| read_err(format!("{name}: {e}")))?;

            match write_entry(&dest, &contents) {
                Ok(()) => {
                    debug!("Extracted: {} -> {:?}", name, dest);
                    report.files_written += 1;
                    report.bytes_written += contents.len() as u64;
                }
                Err(e) => {
                    warn!("{}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Extracted {} files ({} failed, {} skipped)",
            report.files_written, report.failed, report.skipped
        );
        Ok(report)
    }

    /// Run [`ArchiveExtractor::extract`] on the blocking thread pool.
    pub async fn extract_blocking(
        self,
        archive_path: PathBuf,
        dest_root: PathBuf,
    ) -> SyncResult<ExtractReport> {
        let task_path = archive_path.clone();
        tokio::task::spawn_blocking(move || self.extract(&task_path, &dest_root))
            .await
            .map_err(|e| SyncError::ArchiveRead {
                path: archive_path,
                reason: format!("extraction task failed: {e}"),
            })?
    }
}

fn write_entry(dest: &Path, contents: &[u8]) -> SyncResult<()> {
    let write_err = |source| SyncError::ExtractWrite {
        path: dest.to_path_buf(),
        source,
    };
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    write_atomic(dest, contents).map_err(write_err)
}
