pub mod cli;
pub mod core;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use crate::core::config::SyncConfig;
pub use crate::core::error::{SyncError, SyncResult};
pub use crate::core::sync::{Orchestrator, SyncOutcome};

/// Install the global `tracing` subscriber. Logs go to stderr.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,assetsync_lib=debug")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// CLI entry point. Returns the process exit code.
pub fn run() -> i32 {
    let cli = cli::Cli::parse();
    init_logging();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return 1;
        }
    };

    match runtime.block_on(cli::execute(cli)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            1
        }
    }
}
