use crate::audio::{AudioFormat, AudioTime, PcmBuffer, SinkFactory, WavSinkFactory};
use crate::error::{GraphError, RecordingError};
use crate::graph::{AudioGraph, MAX_TAP_BUFFER_SIZE, MIXER_BUS, TapBlock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Frames per tap buffer requested from the graph.
pub const DEFAULT_TAP_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
}

/// How start/stop failures reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Every failure is returned as an error.
    #[default]
    Strict,
    /// Failures are logged and the call becomes a no-op.
    Lenient,
}

/// Counters shared with the tap callback.
#[derive(Debug, Default)]
struct RecordingStats {
    buffers_written: AtomicU64,
    frames_written: AtomicU64,
    dropped_buffers: AtomicU64,
}

impl RecordingStats {
    fn record_write(&self, frames: usize) {
        self.buffers_written.fetch_add(1, Ordering::Relaxed);
        self.frames_written.fetch_add(frames as u64, Ordering::Relaxed);
    }

    fn record_drop(&self) {
        self.dropped_buffers.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            buffers_written: self.buffers_written.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            dropped_buffers: self.dropped_buffers.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub buffers_written: u64,
    pub frames_written: u64,
    pub dropped_buffers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub buffers_written: u64,
    pub frames_written: u64,
    pub dropped_buffers: u64,
}

impl RecordingSummary {
    /// Length of the audio that reached the sink.
    pub fn duration(&self) -> Duration {
        AudioTime::new(self.frames_written, self.format.sample_rate).as_duration()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped(RecordingSummary),
    /// A lenient start or stop did nothing.
    Unchanged,
}

struct ActiveRecording {
    path: PathBuf,
    format: AudioFormat,
    stats: Arc<RecordingStats>,
}

/// Records the mixer output of an [`AudioGraph`] to a file.
///
/// While recording, a tap on the mixer's bus 0 owns the file sink and writes
/// every delivered buffer to it. The sink is released, and the file closed,
/// when the tap is removed on stop.
pub struct RecordingSidecar<G, F = WavSinkFactory> {
    graph: G,
    factory: F,
    policy: FailurePolicy,
    tap_buffer_size: usize,
    active: Option<ActiveRecording>,
}

impl<G: AudioGraph> RecordingSidecar<G> {
    pub fn new(graph: G) -> Self {
        Self::with_factory(graph, WavSinkFactory::default())
    }
}

impl<G: AudioGraph, F: SinkFactory> RecordingSidecar<G, F> {
    pub fn with_factory(graph: G, factory: F) -> Self {
        Self {
            graph,
            factory,
            policy: FailurePolicy::default(),
            tap_buffer_size: DEFAULT_TAP_BUFFER_SIZE,
            active: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tap_buffer_size(mut self, frames: usize) -> Self {
        self.tap_buffer_size = frames;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn state(&self) -> RecordingState {
        if self.is_recording() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.active.as_ref().map(|active| active.stats.snapshot())
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Record to `path` in the mixer's current output format.
    pub fn start_recording(&mut self, path: impl AsRef<Path>) -> Result<(), RecordingError> {
        let result = self
            .graph
            .mixer_format(MIXER_BUS)
            .map_err(RecordingError::from)
            .and_then(|format| self.try_start(path.as_ref(), format));
        self.apply_policy(result, "start").map(|_| ())
    }

    /// Record to `path`, storing samples in `format`.
    pub fn start_recording_with_format(
        &mut self,
        path: impl AsRef<Path>,
        format: AudioFormat,
    ) -> Result<(), RecordingError> {
        let result = self.try_start(path.as_ref(), format);
        self.apply_policy(result, "start").map(|_| ())
    }

    /// Remove the tap and close the file.
    ///
    /// Returns `Ok(None)` only under [`FailurePolicy::Lenient`] when there was
    /// nothing to stop.
    pub fn stop_recording(&mut self) -> Result<Option<RecordingSummary>, RecordingError> {
        let result = self.try_stop();
        self.apply_policy(result, "stop")
    }

    pub fn toggle_recording(&mut self, path: impl AsRef<Path>) -> Result<Toggle, RecordingError> {
        if self.is_recording() {
            return Ok(match self.stop_recording()? {
                Some(summary) => Toggle::Stopped(summary),
                None => Toggle::Unchanged,
            });
        }

        self.start_recording(path)?;
        Ok(if self.is_recording() {
            Toggle::Started
        } else {
            Toggle::Unchanged
        })
    }

    /// Give the graph back, stopping an active recording if the graph allows it.
    pub fn into_graph(mut self) -> G {
        if self.is_recording() {
            if let Err(e) = self.try_stop() {
                tracing::warn!("Recording still active while releasing graph: {}", e);
            }
        }
        self.graph
    }

    fn try_start(&mut self, path: &Path, format: AudioFormat) -> Result<(), RecordingError> {
        if !self.graph.is_running() {
            return Err(RecordingError::GraphNotRunning);
        }
        if self.is_recording() {
            return Err(RecordingError::AlreadyRecording);
        }

        let tap_format = self.graph.output_format(MIXER_BUS)?;
        if !format.is_compatible(&tap_format) {
            return Err(RecordingError::IncompatibleFormat {
                recording: format,
                tap: tap_format,
            });
        }
        if !(1..=MAX_TAP_BUFFER_SIZE).contains(&self.tap_buffer_size) {
            return Err(GraphError::InvalidBufferSize(self.tap_buffer_size).into());
        }

        let mut sink = self.factory.create(path, &format).map_err(|source| {
            RecordingError::SinkCreationFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let stats = Arc::new(RecordingStats::default());
        let tap_stats = Arc::clone(&stats);
        let tap: TapBlock = Box::new(move |buffer: &PcmBuffer, _time: AudioTime| {
            match sink.write(buffer) {
                Ok(()) => tap_stats.record_write(buffer.frame_count()),
                Err(_) => tap_stats.record_drop(),
            }
        });

        self.graph
            .install_tap(MIXER_BUS, self.tap_buffer_size, tap_format, tap)?;

        tracing::info!("Recording started: {:?} ({})", path, format);
        self.active = Some(ActiveRecording {
            path: path.to_path_buf(),
            format,
            stats,
        });
        Ok(())
    }

    fn try_stop(&mut self) -> Result<RecordingSummary, RecordingError> {
        if !self.graph.is_running() {
            return Err(RecordingError::GraphNotRunning);
        }
        let active = self.active.take().ok_or(RecordingError::NotRecording)?;

        // Dropping the tap drops the sink, which flushes and closes the file.
        self.graph.remove_tap(MIXER_BUS);

        let stats = active.stats.snapshot();
        let summary = RecordingSummary {
            path: active.path,
            format: active.format,
            buffers_written: stats.buffers_written,
            frames_written: stats.frames_written,
            dropped_buffers: stats.dropped_buffers,
        };
        tracing::info!(
            "Recording stopped: {:?} ({:.2?}, {} dropped buffers)",
            summary.path,
            summary.duration(),
            summary.dropped_buffers
        );
        Ok(summary)
    }

    fn apply_policy<T>(
        &self,
        result: Result<T, RecordingError>,
        action: &str,
    ) -> Result<Option<T>, RecordingError> {
        match (result, self.policy) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), FailurePolicy::Strict) => Err(e),
            (Err(e), FailurePolicy::Lenient) => {
                tracing::warn!("Ignoring failed recording {}: {}", action, e);
                Ok(None)
            }
        }
    }
}
