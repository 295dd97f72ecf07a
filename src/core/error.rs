use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the synchronization pipeline.
/// Every module returns `Result<T, SyncError>`.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Request to {url} failed: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Empty response body from {url}")]
    EmptyBody { url: String },

    // ── Upstream documents ──────────────────────────────
    #[error("Malformed {document}: {reason}")]
    UpstreamFormat {
        document: &'static str,
        reason: String,
    },

    #[error("Version {0} not found in manifest")]
    NotFound(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Cannot open archive {path:?}: {reason}")]
    ArchiveOpen { path: PathBuf, reason: String },

    #[error("Corrupt archive {path:?}: {reason}")]
    ArchiveRead { path: PathBuf, reason: String },

    #[error("Failed to write extracted file {path:?}: {source}")]
    ExtractWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Resource objects ────────────────────────────────
    #[error("Failed to write downloaded file {path:?}: {source}")]
    DownloadWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Refusing unsafe path: {0}")]
    UnsafePath(String),

    // ── Config ──────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub(crate) fn upstream(document: &'static str, err: impl std::fmt::Display) -> Self {
        SyncError::UpstreamFormat {
            document,
            reason: err.to_string(),
        }
    }

    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SyncError::Transport { .. } | SyncError::EmptyBody { .. } => true,
            SyncError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(source: std::io::Error) -> Self {
        SyncError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let busy = SyncError::HttpStatus {
            url: "u".into(),
            status: 503,
        };
        let missing = SyncError::HttpStatus {
            url: "u".into(),
            status: 404,
        };
        assert!(busy.is_transient());
        assert!(!missing.is_transient());
        assert!(!SyncError::NotFound("1.0".into()).is_transient());
    }

    #[test]
    fn upstream_error_names_the_document() {
        let err = SyncError::upstream("asset index", "missing field `objects`");
        assert_eq!(
            err.to_string(),
            "Malformed asset index: missing field `objects`"
        );
    }
}
