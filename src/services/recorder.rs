use crate::audio::SampleEncoding;
use crate::graph::{AudioGraph, MIXER_BUS};
use crate::messages::{RecorderCommand, RecorderStatus};
use crate::recording::{RecordingSidecar, RecordingSummary, Toggle};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};

/// Owns a [`RecordingSidecar`] and serves start/stop commands
///
/// Recordings are named `<prefix>-<unix seconds>.wav` inside the output
/// directory. When every handle is dropped the service stops any active
/// recording and returns the graph.
///
/// Note: with `CpalEngine` the graph holds a cpal::Stream which is !Send, so the
/// service must be spawned on a LocalSet using tokio::task::spawn_local.
pub struct Recorder<G: AudioGraph> {
    sidecar: RecordingSidecar<G>,
    output_dir: PathBuf,
    file_prefix: String,
    encoding: Option<SampleEncoding>,
    cmd_rx: mpsc::Receiver<RecorderCommand>,
}

impl<G: AudioGraph> Recorder<G> {
    pub fn new(
        sidecar: RecordingSidecar<G>,
        output_dir: impl Into<PathBuf>,
        file_prefix: impl Into<String>,
        cmd_rx: mpsc::Receiver<RecorderCommand>,
    ) -> Self {
        Self {
            sidecar,
            output_dir: output_dir.into(),
            file_prefix: file_prefix.into(),
            encoding: None,
            cmd_rx,
        }
    }

    /// Store recordings with `encoding` instead of the mixer's native format.
    pub fn with_encoding(mut self, encoding: Option<SampleEncoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub async fn run(mut self) -> G {
        while let Some(cmd) = self.cmd_rx.recv().await {
            self.handle_command(cmd);
        }

        if self.sidecar.is_recording() {
            tracing::info!("Recorder shutting down, stopping active recording");
        }
        self.sidecar.into_graph()
    }

    fn handle_command(&mut self, cmd: RecorderCommand) {
        match cmd {
            RecorderCommand::Start(reply) => {
                let _ = reply.send(self.start());
            }
            RecorderCommand::Stop(reply) => {
                let _ = reply.send(self.stop());
            }
            RecorderCommand::Toggle(reply) => {
                let result = if self.sidecar.is_recording() {
                    self.stop().map(|summary| match summary {
                        Some(summary) => Toggle::Stopped(summary),
                        None => Toggle::Unchanged,
                    })
                } else {
                    self.start().map(|path| match path {
                        Some(_) => Toggle::Started,
                        None => Toggle::Unchanged,
                    })
                };
                let _ = reply.send(result);
            }
            RecorderCommand::Status(reply) => {
                let _ = reply.send(RecorderStatus {
                    state: self.sidecar.state(),
                    path: self.sidecar.current_path().map(|p| p.to_path_buf()),
                    stats: self.sidecar.stats(),
                });
            }
        }
    }

    fn start(&mut self) -> Result<Option<PathBuf>> {
        let path = self.next_path()?;

        match self.encoding {
            Some(encoding) => {
                let format = self
                    .sidecar
                    .graph()
                    .mixer_format(MIXER_BUS)
                    .context("Failed to query mixer format")?
                    .with_encoding(encoding);
                self.sidecar.start_recording_with_format(&path, format)?;
            }
            None => self.sidecar.start_recording(&path)?,
        }

        Ok(self.sidecar.is_recording().then_some(path))
    }

    fn stop(&mut self) -> Result<Option<RecordingSummary>> {
        let summary = self.sidecar.stop_recording()?;
        if let Some(summary) = &summary {
            tracing::info!("Recording saved to: {:?}", summary.path);
        }
        Ok(summary)
    }

    fn next_path(&self) -> Result<PathBuf> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_secs();

        let mut path = self
            .output_dir
            .join(format!("{}-{}.wav", self.file_prefix, stamp));
        let mut suffix = 1;
        while path.exists() {
            path = self
                .output_dir
                .join(format!("{}-{}-{}.wav", self.file_prefix, stamp, suffix));
            suffix += 1;
        }
        Ok(path)
    }
}

/// Handle for communicating with the Recorder
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
}

impl RecorderHandle {
    pub fn new(tx: mpsc::Sender<RecorderCommand>) -> Self {
        Self { tx }
    }

    pub async fn start(&self) -> Result<Option<PathBuf>> {
        self.request(RecorderCommand::Start).await?
    }

    pub async fn stop(&self) -> Result<Option<RecordingSummary>> {
        self.request(RecorderCommand::Stop).await?
    }

    pub async fn toggle(&self) -> Result<Toggle> {
        self.request(RecorderCommand::Toggle).await?
    }

    pub async fn status(&self) -> Result<RecorderStatus> {
        self.request(RecorderCommand::Status).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RecorderCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send recorder command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive recorder response: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use crate::engine::OfflineEngine;
    use crate::recording::{FailurePolicy, RecordingState};
    use tempfile::tempdir;

    fn spawn_recorder(
        engine: OfflineEngine,
        dir: &std::path::Path,
        encoding: Option<SampleEncoding>,
        policy: FailurePolicy,
    ) -> (RecorderHandle, tokio::task::JoinHandle<OfflineEngine>) {
        let (tx, rx) = mpsc::channel(10);
        let sidecar = RecordingSidecar::new(engine).with_policy(policy);
        let recorder = Recorder::new(sidecar, dir, "take", rx).with_encoding(encoding);
        (RecorderHandle::new(tx), tokio::spawn(recorder.run()))
    }

    fn running_engine() -> OfflineEngine {
        let mut engine = OfflineEngine::new(AudioFormat::float32(44_100, 2));
        engine.start();
        engine
    }

    #[tokio::test]
    async fn toggle_starts_and_stops() {
        let dir = tempdir().unwrap();
        let (handle, task) =
            spawn_recorder(running_engine(), dir.path(), None, FailurePolicy::Strict);

        assert_eq!(handle.toggle().await.unwrap(), Toggle::Started);

        let status = handle.status().await.unwrap();
        assert_eq!(status.state, RecordingState::Recording);
        let path = status.path.unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("take-"));

        match handle.toggle().await.unwrap() {
            Toggle::Stopped(summary) => assert_eq!(summary.path, path),
            other => panic!("expected stop, got {:?}", other),
        }

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 0);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn encoding_override_sets_file_format() {
        let dir = tempdir().unwrap();
        let (handle, _task) = spawn_recorder(
            running_engine(),
            dir.path(),
            Some(SampleEncoding::Int16),
            FailurePolicy::Strict,
        );

        let path = handle.start().await.unwrap().unwrap();
        let summary = handle.stop().await.unwrap().unwrap();
        assert_eq!(summary.format.encoding, SampleEncoding::Int16);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().sample_format, hound::SampleFormat::Int);
    }

    #[tokio::test]
    async fn consecutive_starts_get_distinct_files() {
        let dir = tempdir().unwrap();
        let (handle, _task) =
            spawn_recorder(running_engine(), dir.path(), None, FailurePolicy::Strict);

        let first = handle.start().await.unwrap().unwrap();
        handle.stop().await.unwrap();
        let second = handle.start().await.unwrap().unwrap();
        handle.stop().await.unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[tokio::test]
    async fn strict_errors_reach_the_handle() {
        let dir = tempdir().unwrap();
        let engine = OfflineEngine::new(AudioFormat::default());
        let (handle, _task) = spawn_recorder(engine, dir.path(), None, FailurePolicy::Strict);

        let err = handle.start().await.unwrap_err();
        assert!(err.to_string().contains("not running"));
        assert!(handle.stop().await.is_err());
    }

    #[tokio::test]
    async fn lenient_start_reports_nothing_started() {
        let dir = tempdir().unwrap();
        let engine = OfflineEngine::new(AudioFormat::default());
        let (handle, _task) = spawn_recorder(engine, dir.path(), None, FailurePolicy::Lenient);

        assert_eq!(handle.start().await.unwrap(), None);
        assert_eq!(handle.toggle().await.unwrap(), Toggle::Unchanged);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn dropping_handles_stops_recording() {
        let dir = tempdir().unwrap();
        let (handle, task) =
            spawn_recorder(running_engine(), dir.path(), None, FailurePolicy::Strict);

        handle.start().await.unwrap();
        drop(handle);

        let engine = task.await.unwrap();
        assert!(!engine.tap_installed(MIXER_BUS));
    }
}
