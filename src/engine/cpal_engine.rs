use super::mixer::MixerNode;
use super::source::Source;
use crate::audio::AudioFormat;
use crate::error::GraphError;
use crate::graph::{AudioGraph, TapBlock};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Playback engine on the default output device.
///
/// Holds a `cpal::Stream` while running, which is `!Send`; keep the engine on
/// the thread (or `LocalSet`) that created it.
pub struct CpalEngine {
    device: cpal::Device,
    config: StreamConfig,
    format: AudioFormat,
    mixer: Arc<Mutex<MixerNode>>,
    stream: Option<cpal::Stream>,
}

impl CpalEngine {
    /// Open the default output device, optionally forcing a sample rate.
    pub fn new(sample_rate: Option<u32>) -> Result<Self, GraphError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| GraphError::Device("No output audio device available".into()))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| GraphError::Device(format!("Failed to query output config: {}", e)))?;

        let config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: sample_rate
                .map(SampleRate)
                .unwrap_or_else(|| default_config.sample_rate()),
            buffer_size: BufferSize::Default,
        };
        let format = AudioFormat::float32(config.sample_rate.0, config.channels);

        if let Ok(name) = device.name() {
            tracing::info!("Using output device {} ({})", name, format);
        }

        Ok(Self {
            device,
            config,
            format,
            mixer: Arc::new(Mutex::new(MixerNode::new(format))),
            stream: None,
        })
    }

    pub fn start(&mut self) -> Result<(), GraphError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mixer = Arc::clone(&self.mixer);
        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| match mixer.lock() {
                    Ok(mut mixer) => mixer.render(data),
                    Err(_) => data.fill(0.0),
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| GraphError::Device(format!("Failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| GraphError::Device(format!("Failed to start audio stream: {}", e)))?;

        self.stream = Some(stream);
        tracing::info!("Playback engine started");
        Ok(())
    }

    pub fn stop(&mut self) {
        // Dropping the stream stops the device callback.
        if self.stream.take().is_some() {
            tracing::info!("Playback engine stopped");
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn add_source(&self, source: Box<dyn Source>) {
        self.mixer().add_source(source);
    }

    pub fn set_volume(&self, volume: f32) {
        self.mixer().set_volume(volume);
    }

    fn mixer(&self) -> MutexGuard<'_, MixerNode> {
        self.mixer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioGraph for CpalEngine {
    fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    fn mixer_format(&self, bus: usize) -> Result<AudioFormat, GraphError> {
        let mixer = self.mixer();
        mixer.check_bus(bus)?;
        Ok(mixer.format())
    }

    fn output_format(&self, bus: usize) -> Result<AudioFormat, GraphError> {
        self.mixer().check_bus(bus)?;
        Ok(self.format)
    }

    fn install_tap(
        &mut self,
        bus: usize,
        buffer_size: usize,
        format: AudioFormat,
        tap: TapBlock,
    ) -> Result<(), GraphError> {
        self.mixer().install_tap(bus, buffer_size, format, tap)
    }

    fn remove_tap(&mut self, bus: usize) {
        let tap = self.mixer().take_tap(bus);
        // Finish outside the lock so the render callback is not held up while
        // the tap's resources are released.
        if let Some(tap) = tap {
            tap.finish();
        }
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
