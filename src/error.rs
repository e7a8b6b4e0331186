use crate::audio::AudioFormat;
use std::path::PathBuf;

/// Failures reported by an [`AudioGraph`](crate::AudioGraph).
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("bus {0} does not exist on the mixer node")]
    InvalidBus(usize),

    #[error("a tap is already installed on bus {0}")]
    TapAlreadyInstalled(usize),

    #[error("tap format {requested} does not match node format {node}")]
    FormatMismatch {
        requested: AudioFormat,
        node: AudioFormat,
    },

    #[error("tap buffer size {0} is outside 1..={max}", max = crate::graph::MAX_TAP_BUFFER_SIZE)]
    InvalidBufferSize(usize),

    #[error("audio graph is not running")]
    NotRunning,

    #[error("audio device error: {0}")]
    Device(String),
}

/// Failures of an [`AudioFileSink`](crate::AudioFileSink) or its factory.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("buffer has {actual} channels, sink expects {expected}")]
    ChannelMismatch { expected: u16, actual: u16 },

    #[error("sink writer is closed")]
    Closed,

    #[error("writer queue full, dropped {frames} frames")]
    QueueFull { frames: usize },

    #[error("invalid writer queue size of {0} frames")]
    InvalidQueueSize(usize),

    #[error("failed to finalize file: {0}")]
    Finalize(#[source] hound::Error),
}

/// Failures of [`RecordingSidecar`](crate::RecordingSidecar) start and stop.
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("audio graph is not running")]
    GraphNotRunning,

    #[error("already recording")]
    AlreadyRecording,

    #[error("not recording")]
    NotRecording,

    #[error("could not open recording file {}", .path.display())]
    SinkCreationFailed {
        path: PathBuf,
        #[source]
        source: SinkError,
    },

    #[error("recording format {recording} is incompatible with tap format {tap}")]
    IncompatibleFormat {
        recording: AudioFormat,
        tap: AudioFormat,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}
