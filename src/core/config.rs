// ─── Sync Configuration ───
// Defaults, optional JSON file, environment overrides. CLI flags are
// applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{SyncError, SyncResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net/";

const APP_DIR_NAME: &str = "assetsync";
const CONFIG_FILE: &str = "config.json";

const MIN_CONCURRENCY: usize = 1;
const MAX_CONCURRENCY: usize = 64;
const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub manifest_url: String,
    pub resources_url: String,
    pub base_path: PathBuf,
    /// Number of resource download workers.
    pub concurrency: usize,
    pub timeout_secs: u64,
    /// Attempts per resource object, including the first one.
    pub retries: u32,
    /// Check object content against its SHA-1 before writing and when
    /// deciding whether an existing file can be kept.
    pub verify_hashes: bool,
    /// Wipe `resources/` before syncing. When false the run is incremental.
    pub clean: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            manifest_url: VERSION_MANIFEST_URL.to_string(),
            resources_url: RESOURCES_URL.to_string(),
            base_path: PathBuf::from("assets"),
            concurrency: 16,
            timeout_secs: 25,
            retries: 3,
            verify_hashes: true,
            clean: true,
        }
    }
}

impl SyncConfig {
    /// Defaults, then `explicit` (or the per-user config file when it exists),
    /// then environment overrides.
    pub fn load(explicit: Option<&Path>) -> SyncResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply `ASSETSYNC_*` overrides. Unparseable numbers are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ASSETSYNC_MANIFEST_URL") {
            self.manifest_url = url;
        }
        if let Some(url) = lookup("ASSETSYNC_RESOURCES_URL") {
            self.resources_url = url;
        }
        if let Some(n) = parse_env(&lookup, "ASSETSYNC_CONCURRENCY") {
            self.concurrency = n;
        }
        if let Some(n) = parse_env(&lookup, "ASSETSYNC_TIMEOUT_SECS") {
            self.timeout_secs = n;
        }
        if let Some(n) = parse_env(&lookup, "ASSETSYNC_RETRIES") {
            self.retries = n;
        }
    }

    pub fn validate(&mut self) -> SyncResult<()> {
        if self.manifest_url.trim().is_empty() {
            return Err(SyncError::Config("manifest_url is empty".into()));
        }
        if self.resources_url.trim().is_empty() {
            return Err(SyncError::Config("resources_url is empty".into()));
        }
        if !self.resources_url.ends_with('/') {
            self.resources_url.push('/');
        }
        self.concurrency = self.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        self.retries = self.retries.clamp(1, MAX_RETRIES);
        self.timeout_secs = self.timeout_secs.max(1);
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE))
}
