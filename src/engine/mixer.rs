use super::source::Source;
use crate::audio::{AudioFormat, AudioTime, PcmBuffer};
use crate::error::GraphError;
use crate::graph::{MAX_TAP_BUFFER_SIZE, MIXER_BUS, TapBlock};
use ringbuf::{HeapCons, HeapProd, HeapRb, traits::*};

/// Frames mixed per pass; longer render calls are processed in slices of this
/// size so the scratch buffer never grows on the audio thread.
pub const RENDER_QUANTUM: usize = 1024;

/// Main mix bus shared by the engines.
///
/// Sums every attached source into the render buffer, applies master volume
/// and feeds the rendered frames to the tap on bus 0, if any.
pub struct MixerNode {
    format: AudioFormat,
    sources: Vec<Box<dyn Source>>,
    volume: f32,
    scratch: Vec<f32>,
    rendered_frames: u64,
    tap: Option<TapDispatcher>,
}

impl MixerNode {
    pub fn new(format: AudioFormat) -> Self {
        let channels = usize::from(format.channels.max(1));
        Self {
            format,
            sources: Vec::new(),
            volume: 1.0,
            scratch: vec![0.0; RENDER_QUANTUM * channels],
            rendered_frames: 0,
            tap: None,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn add_source(&mut self, mut source: Box<dyn Source>) {
        source.prepare(self.format.sample_rate);
        self.sources.push(source);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames
    }

    /// Render interleaved frames into `out`, dispatching them to the tap.
    ///
    /// Does not allocate, so it is safe to call from a device callback.
    pub fn render(&mut self, out: &mut [f32]) {
        let quantum = self.scratch.len();
        for slice in out.chunks_mut(quantum) {
            self.render_slice(slice);
        }
    }

    fn render_slice(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        let channels = self.format.channels;
        let scratch = &mut self.scratch[..out.len()];
        for source in &mut self.sources {
            source.fill(scratch, channels);
            for (mixed, sample) in out.iter_mut().zip(scratch.iter()) {
                *mixed += *sample;
            }
        }

        if self.volume < 1.0 {
            for sample in out.iter_mut() {
                *sample *= self.volume;
            }
        }

        if let Some(tap) = self.tap.as_mut() {
            tap.push(out);
        }
        self.rendered_frames += (out.len() / usize::from(channels.max(1))) as u64;
    }

    pub fn check_bus(&self, bus: usize) -> Result<(), GraphError> {
        if bus == MIXER_BUS {
            Ok(())
        } else {
            Err(GraphError::InvalidBus(bus))
        }
    }

    pub fn install_tap(
        &mut self,
        bus: usize,
        buffer_size: usize,
        format: AudioFormat,
        tap: TapBlock,
    ) -> Result<(), GraphError> {
        self.check_bus(bus)?;
        if tap_block_len(buffer_size, self.format.channels).is_none() {
            return Err(GraphError::InvalidBufferSize(buffer_size));
        }
        if !format.is_compatible(&self.format) {
            return Err(GraphError::FormatMismatch {
                requested: format,
                node: self.format,
            });
        }
        if self.tap.is_some() {
            return Err(GraphError::TapAlreadyInstalled(bus));
        }

        self.tap = Some(TapDispatcher::new(
            tap,
            buffer_size,
            self.format,
            self.rendered_frames,
        ));
        Ok(())
    }

    /// Detach the tap without dropping it, so the caller can release it
    /// outside the render lock.
    pub fn take_tap(&mut self, bus: usize) -> Option<TapDispatcher> {
        if bus != MIXER_BUS {
            return None;
        }
        self.tap.take()
    }

    pub fn has_tap(&self, bus: usize) -> bool {
        bus == MIXER_BUS && self.tap.is_some()
    }

    /// Hand `buffer` straight to the tap callback, bypassing re-blocking.
    pub fn deliver(&mut self, bus: usize, buffer: &PcmBuffer, time: AudioTime) -> bool {
        match self.tap.as_mut() {
            Some(tap) if bus == MIXER_BUS => {
                tap.deliver(buffer, time);
                true
            }
            _ => false,
        }
    }
}

/// Samples in a tap block of `buffer_size` frames, plus room for the second
/// block the dispatch ring holds. `None` when the size is out of range.
fn tap_block_len(buffer_size: usize, channels: u16) -> Option<usize> {
    if buffer_size == 0 || buffer_size > MAX_TAP_BUFFER_SIZE {
        return None;
    }
    let block = buffer_size.checked_mul(usize::from(channels.max(1)))?;
    block.checked_mul(2).map(|_| block)
}

/// Re-blocks rendered frames into `buffer_size` frame buffers for a tap.
pub struct TapDispatcher {
    tap: TapBlock,
    producer: HeapProd<f32>,
    consumer: HeapCons<f32>,
    block: PcmBuffer,
    sample_rate: u32,
    sample_time: u64,
}

impl TapDispatcher {
    fn new(tap: TapBlock, buffer_size: usize, format: AudioFormat, sample_time: u64) -> Self {
        let block = PcmBuffer::silence(buffer_size, format.channels);
        let ring = HeapRb::<f32>::new(block.samples().len() * 2);
        let (producer, consumer) = ring.split();

        Self {
            tap,
            producer,
            consumer,
            block,
            sample_rate: format.sample_rate,
            sample_time,
        }
    }

    fn push(&mut self, samples: &[f32]) {
        let block_len = self.block.samples().len();
        let mut offset = 0;
        while offset < samples.len() {
            offset += self.producer.push_slice(&samples[offset..]);
            while self.consumer.occupied_len() >= block_len {
                self.consumer.pop_slice(self.block.samples_mut());
                let time = AudioTime::new(self.sample_time, self.sample_rate);
                (self.tap)(&self.block, time);
                self.sample_time += self.block.frame_count() as u64;
            }
        }
    }

    fn deliver(&mut self, buffer: &PcmBuffer, time: AudioTime) {
        (self.tap)(buffer, time);
    }

    /// Deliver the trailing partial block, then drop the callback.
    pub fn finish(mut self) {
        let remaining = self.consumer.occupied_len();
        if remaining == 0 {
            return;
        }

        let mut samples = vec![0.0f32; remaining];
        let n = self.consumer.pop_slice(&mut samples);
        samples.truncate(n);

        let buffer = PcmBuffer::new(samples, self.block.channels());
        let time = AudioTime::new(self.sample_time, self.sample_rate);
        (self.tap)(&buffer, time);
    }
}
