use super::mixer::MixerNode;
use super::source::Source;
use crate::audio::{AudioFormat, AudioTime, PcmBuffer};
use crate::error::GraphError;
use crate::graph::{AudioGraph, TapBlock};

/// Manually rendered engine with no device behind it.
///
/// Frames only flow when the caller asks for them, which makes recording
/// deterministic in tests and headless environments.
pub struct OfflineEngine {
    mixer: MixerNode,
    running: bool,
}

impl OfflineEngine {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            mixer: MixerNode::new(format),
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn add_source(&mut self, source: Box<dyn Source>) {
        self.mixer.add_source(source);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.mixer.set_volume(volume);
    }

    /// Render `frames` through the mixer, feeding any installed tap.
    pub fn render(&mut self, frames: usize) -> Result<PcmBuffer, GraphError> {
        if !self.running {
            return Err(GraphError::NotRunning);
        }
        let mut buffer = PcmBuffer::silence(frames, self.mixer.format().channels);
        self.mixer.render(buffer.samples_mut());
        Ok(buffer)
    }

    /// Push `buffer` straight through the tap callback on `bus`.
    ///
    /// Returns `false` when no tap is installed.
    pub fn deliver(&mut self, bus: usize, buffer: &PcmBuffer, time: AudioTime) -> bool {
        self.mixer.deliver(bus, buffer, time)
    }

    pub fn tap_installed(&self, bus: usize) -> bool {
        self.mixer.has_tap(bus)
    }

    pub fn rendered_frames(&self) -> u64 {
        self.mixer.rendered_frames()
    }
}

impl AudioGraph for OfflineEngine {
    fn is_running(&self) -> bool {
        self.running
    }

    fn mixer_format(&self, bus: usize) -> Result<AudioFormat, GraphError> {
        self.mixer.check_bus(bus)?;
        Ok(self.mixer.format())
    }

    fn output_format(&self, bus: usize) -> Result<AudioFormat, GraphError> {
        self.mixer_format(bus)
    }

    fn install_tap(
        &mut self,
        bus: usize,
        buffer_size: usize,
        format: AudioFormat,
        tap: TapBlock,
    ) -> Result<(), GraphError> {
        self.mixer.install_tap(bus, buffer_size, format, tap)
    }

    fn remove_tap(&mut self, bus: usize) {
        if let Some(tap) = self.mixer.take_tap(bus) {
            tap.finish();
        }
    }
}
