pub mod orchestrator;

pub use orchestrator::{AssetsReport, Orchestrator, SyncOutcome, Task};
