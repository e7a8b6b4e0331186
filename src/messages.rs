use crate::recording::{RecordingState, RecordingSummary, StatsSnapshot, Toggle};
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Commands for the Recorder service
pub enum RecorderCommand {
    /// Replies with the new file, or `None` when a lenient start did nothing.
    Start(oneshot::Sender<Result<Option<PathBuf>>>),
    Stop(oneshot::Sender<Result<Option<RecordingSummary>>>),
    Toggle(oneshot::Sender<Result<Toggle>>),
    Status(oneshot::Sender<RecorderStatus>),
}

/// Snapshot of the recorder, answered by [`RecorderCommand::Status`]
#[derive(Clone, Debug, PartialEq)]
pub struct RecorderStatus {
    pub state: RecordingState,
    pub path: Option<PathBuf>,
    pub stats: Option<StatsSnapshot>,
}
