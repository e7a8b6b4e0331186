use std::time::Duration;

/// Interleaved block of `f32` samples as delivered by the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    samples: Vec<f32>,
    channels: u16,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, channels: u16) -> Self {
        Self { samples, channels }
    }

    pub fn silence(frames: usize, channels: u16) -> Self {
        Self::new(vec![0.0; frames * usize::from(channels)], channels)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mutable access for in-place refills; the length never changes.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Position of a buffer's first frame on the graph's sample timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTime {
    pub sample_time: u64,
    pub sample_rate: u32,
}

impl AudioTime {
    pub fn new(sample_time: u64, sample_rate: u32) -> Self {
        Self {
            sample_time,
            sample_rate,
        }
    }

    pub fn as_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_time as f64 / f64::from(self.sample_rate))
    }
}
