pub mod client;

pub use client::{BatchReport, DownloadJob, Downloader, JobFailure, JobOutcome};
