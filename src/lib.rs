//! Tap-based recording of a live mix bus.
//!
//! A [`RecordingSidecar`] wraps an [`AudioGraph`] and, while recording, keeps a
//! tap installed on bus 0 of the graph's mixer node. Every buffer the audio
//! thread delivers to the tap is forwarded to an [`AudioFileSink`].

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod messages;
pub mod recording;
pub mod services;

pub use audio::{AudioFileSink, AudioFormat, AudioTime, PcmBuffer, SampleEncoding, SinkFactory};
pub use audio::{WavSink, WavSinkFactory};
pub use engine::{CpalEngine, MixerNode, OfflineEngine, SineSource, Source};
pub use error::{GraphError, RecordingError, SinkError};
pub use graph::{AudioGraph, MIXER_BUS, TapBlock};
pub use recording::{
    FailurePolicy, RecordingSidecar, RecordingState, RecordingSummary, StatsSnapshot, Toggle,
};
