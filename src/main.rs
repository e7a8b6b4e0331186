use mixtap::config::Config;
use mixtap::services::{Recorder, RecorderHandle};
use mixtap::{CpalEngine, RecordingSidecar, SineSource, Toggle, WavSinkFactory};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting mixtap");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Create LocalSet for !Send futures (needed for Recorder which holds cpal::Stream)
    let local = tokio::task::LocalSet::new();

    local.run_until(async move { run_app(config).await }).await
}

async fn run_app(config: Config) -> Result<()> {
    let mut engine = CpalEngine::new(config.sample_rate).context("Failed to open playback engine")?;
    engine.add_source(Box::new(SineSource::new(
        config.tone_frequency,
        config.tone_amplitude,
    )));
    engine.set_volume(config.volume);
    engine.start().context("Failed to start playback engine")?;

    let factory = WavSinkFactory::with_queue_frames(config.sink_queue_frames);
    let sidecar = RecordingSidecar::with_factory(engine, factory)
        .with_policy(config.policy())
        .with_tap_buffer_size(config.tap_buffer_size);

    // Create and spawn Recorder (using spawn_local because it's !Send)
    let (recorder_tx, recorder_rx) = mpsc::channel(10);
    let recorder = Recorder::new(
        sidecar,
        config.output_dir.clone(),
        config.file_prefix.clone(),
        recorder_rx,
    )
    .with_encoding(config.record_encoding);
    let recorder_handle = RecorderHandle::new(recorder_tx);
    let recorder_task = tokio::task::spawn_local(recorder.run());

    tracing::info!("Ready! Press Enter to start/stop recording, q to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read from stdin")? {
                    Some(line) if line.trim() == "q" => break,
                    Some(_) => {
                        if let Err(e) = handle_toggle(&recorder_handle).await {
                            tracing::error!("Error handling toggle: {}", e);
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    // Dropping the last handle makes the recorder stop and hand back the engine.
    drop(recorder_handle);
    let mut engine = recorder_task.await.context("Recorder task failed")?;
    engine.stop();

    tracing::info!("mixtap shutdown complete");
    Ok(())
}

async fn handle_toggle(recorder: &RecorderHandle) -> Result<()> {
    match recorder.toggle().await? {
        Toggle::Started => {
            let status = recorder.status().await?;
            if let Some(path) = status.path {
                tracing::info!("Recording to {:?}", path);
            }
        }
        Toggle::Stopped(summary) => {
            tracing::info!(
                "Recorded {:.1?} ({} buffers, {} dropped) to {:?}",
                summary.duration(),
                summary.buffers_written,
                summary.dropped_buffers,
                summary.path
            );
        }
        Toggle::Unchanged => tracing::debug!("Toggle had no effect"),
    }
    Ok(())
}
