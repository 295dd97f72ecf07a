// ─── assetsync Core ───
// Pipeline that mirrors a game version's assets onto local disk.
//
// Architecture:
//   core/
//     version/    Manifest + version meta resolution
//     archive/    Prefix extraction from the client jar
//     assets/     Asset index + resource object sync
//     downloader/ Bounded worker pool with SHA-1 validation
//     sync/       Entry points sequencing the stages
//     http        Transport trait + reqwest implementation
//     config      Defaults, config file, environment

pub mod archive;
pub mod assets;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fs;
pub mod http;
pub mod progress;
pub mod sync;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
