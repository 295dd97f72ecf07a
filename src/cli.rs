use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::core::config::SyncConfig;
use crate::core::error::SyncResult;
use crate::core::progress::{ProgressSink, Stage, SyncEvent};
use crate::core::sync::{Orchestrator, SyncOutcome};

#[derive(Debug, Parser)]
#[command(
    name = "assetsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mirror Minecraft client assets and resource objects to a local directory"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON config file (defaults to the per-user config when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub manifest_url: Option<String>,

    #[arg(long, global = true)]
    pub resources_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Attempts per resource object.
    #[arg(long, global = true)]
    pub retries: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract assets/minecraft from the client jar into <base>/minecraft.
    #[command(alias = "a")]
    Assets(SyncArgs),
    /// Download asset-index objects into <base>/resources.
    #[command(alias = "r")]
    Resources(ResourceArgs),
    /// Run assets, then resources.
    All(ResourceArgs),
    /// List manifest versions, newest first.
    #[command(alias = "ls")]
    Versions {
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Version id, or latest / latest-release / latest-snapshot.
    #[arg(id = "target_version", value_name = "VERSION", default_value = "latest")]
    pub version: String,

    #[arg(long, short = 'b')]
    pub base_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ResourceArgs {
    #[command(flatten)]
    pub sync: SyncArgs,

    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Keep the existing resources tree and only fetch missing or changed objects.
    #[arg(long)]
    pub keep_existing: bool,

    /// Skip SHA-1 checks; existing files are matched by size.
    #[arg(long)]
    pub no_verify: bool,
}

impl Cli {
    /// Fold command-line flags over a loaded config.
    pub fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(url) = &self.manifest_url {
            config.manifest_url = url.clone();
        }
        if let Some(url) = &self.resources_url {
            config.resources_url = url.clone();
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }

        let sync_args = match &self.command {
            Command::Assets(args) => Some(args),
            Command::Resources(args) | Command::All(args) => {
                if let Some(n) = args.concurrency {
                    config.concurrency = n;
                }
                if args.keep_existing {
                    config.clean = false;
                }
                if args.no_verify {
                    config.verify_hashes = false;
                }
                Some(&args.sync)
            }
            Command::Versions { .. } => None,
        };
        if let Some(base) = sync_args.and_then(|a| a.base_path.clone()) {
            config.base_path = base;
        }
    }

    pub fn load_config(&self) -> SyncResult<SyncConfig> {
        let mut config = SyncConfig::load(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Execute the parsed command and return the process exit code.
pub async fn execute(cli: Cli) -> SyncResult<i32> {
    let config = cli.load_config()?;
    let base = config.base_path.clone();
    let bar = progress_bar();
    let orchestrator = Orchestrator::from_config(config)?.with_progress(progress_sink(&bar));

    let outcomes = match &cli.command {
        Command::Versions { limit } => {
            bar.finish_and_clear();
            for entry in orchestrator.list_versions().await?.iter().take(*limit) {
                println!(
                    "{:<24} {}",
                    entry.id,
                    entry.version_type.as_deref().unwrap_or("-")
                );
            }
            return Ok(0);
        }
        Command::Assets(args) => vec![orchestrator.get_assets(&args.version, &base).await],
        Command::Resources(args) => {
            vec![orchestrator.get_resources(&args.sync.version, &base).await]
        }
        Command::All(args) => vec![
            orchestrator.get_assets(&args.sync.version, &base).await,
            orchestrator.get_resources(&args.sync.version, &base).await,
        ],
    };
    bar.finish_and_clear();

    Ok(report(&outcomes, &base))
}

fn report(outcomes: &[SyncOutcome], base: &Path) -> i32 {
    for outcome in outcomes {
        println!("{outcome}");
        if let SyncOutcome::Resources(r) = outcome {
            for failure in r.failures.iter().take(10) {
                eprintln!("  {}: {}", failure.name, failure.error);
            }
            if r.failures.len() > 10 {
                eprintln!("  ... and {} more", r.failures.len() - 10);
            }
        }
    }
    println!("Output: {}", base.display());

    if outcomes.iter().all(SyncOutcome::is_success) {
        0
    } else {
        1
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn progress_sink(bar: &ProgressBar) -> ProgressSink {
    let bar = bar.clone();
    Arc::new(move |event: SyncEvent| match event {
        SyncEvent::Stage(stage) => {
            let msg = match stage {
                Stage::Resolving => "Resolving version",
                Stage::DownloadingArchive => "Downloading client.jar",
                Stage::Extracting => "Extracting assets",
                Stage::FetchingIndex => "Fetching asset index",
            };
            bar.set_message(msg);
            bar.tick();
        }
        SyncEvent::ArchiveDownloaded { bytes } => {
            bar.set_message(format!("Downloaded client.jar ({} KiB)", bytes / 1024));
        }
        SyncEvent::ObjectsQueued { total } => {
            bar.set_message("Downloading resources");
            bar.set_position(0);
            bar.set_length(total as u64);
        }
        SyncEvent::ObjectFinished { completed, .. } => {
            bar.set_position(completed as u64);
        }
    })
}
