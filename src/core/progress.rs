use std::sync::Arc;

/// Pipeline stage boundaries, in the order an entry point walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    DownloadingArchive,
    Extracting,
    FetchingIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    Downloaded,
    Skipped,
    Failed,
}

/// Progress notifications delivered to a [`ProgressSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Stage(Stage),
    ArchiveDownloaded { bytes: u64 },
    ObjectsQueued { total: usize },
    ObjectFinished {
        name: String,
        status: ObjectStatus,
        completed: usize,
        total: usize,
    },
}

/// Callback receiving [`SyncEvent`]s. Called from download workers, so it
/// must be cheap and thread-safe.
pub type ProgressSink = Arc<dyn Fn(SyncEvent) + Send + Sync>;

pub(crate) fn emit(sink: &Option<ProgressSink>, event: SyncEvent) {
    if let Some(sink) = sink {
        sink(event);
    }
}
