use std::f32::consts::TAU;

/// Signal generator feeding the mixer.
///
/// `fill` runs on the audio thread and overwrites `out` with interleaved frames.
pub trait Source: Send {
    /// Called once when the source is attached to a mixer.
    fn prepare(&mut self, _sample_rate: u32) {}

    fn fill(&mut self, out: &mut [f32], channels: u16);
}

/// Sine tone written identically to every channel.
pub struct SineSource {
    frequency: f32,
    amplitude: f32,
    phase: f32,
    step: f32,
}

impl SineSource {
    pub fn new(frequency: f32, amplitude: f32) -> Self {
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            phase: 0.0,
            step: 0.0,
        }
    }
}

impl Source for SineSource {
    fn prepare(&mut self, sample_rate: u32) {
        self.step = if sample_rate == 0 {
            0.0
        } else {
            TAU * self.frequency / sample_rate as f32
        };
    }

    fn fill(&mut self, out: &mut [f32], channels: u16) {
        let channels = usize::from(channels.max(1));
        for frame in out.chunks_mut(channels) {
            let value = self.phase.sin() * self.amplitude;
            frame.fill(value);
            self.phase = (self.phase + self.step) % TAU;
        }
    }
}
