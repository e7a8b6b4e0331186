use super::buffer::PcmBuffer;
use super::format::{AudioFormat, SampleEncoding};
use super::sink::{AudioFileSink, SinkFactory};
use crate::error::SinkError;
use hound::{SampleFormat, WavSpec, WavWriter};
use ringbuf::{HeapCons, HeapProd, HeapRb, traits::*};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, Thread};
use std::time::Duration;

type Writer = WavWriter<BufWriter<File>>;

/// Frames the writer queue holds by default (32 tap blocks of 4096).
pub const DEFAULT_QUEUE_FRAMES: usize = 1 << 17;

/// Largest writer queue, in frames, a sink accepts.
pub const MAX_QUEUE_FRAMES: usize = 1 << 24;

/// Samples popped from the queue per write pass on the writer thread.
const WRITE_CHUNK: usize = 8192;

/// Upper bound on how long the writer sleeps without a wakeup.
const IDLE_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct WriterFlags {
    closed: AtomicBool,
    failed: AtomicBool,
}

/// WAV encoder using a dedicated blocking thread for I/O
///
/// The audio thread only copies samples into a preallocated ring buffer and
/// wakes the writer thread, which converts them to the file encoding and
/// performs all disk access. A write that does not fit in the ring is
/// rejected with [`SinkError::QueueFull`] instead of waiting. The file
/// header is finalized when the sink is finalized or dropped.
pub struct WavSink {
    path: PathBuf,
    channels: u16,
    producer: HeapProd<f32>,
    writer_thread: Thread,
    worker: Option<JoinHandle<Result<(), hound::Error>>>,
    flags: Arc<WriterFlags>,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, format: AudioFormat) -> Result<Self, SinkError> {
        Self::with_queue_frames(path, format, DEFAULT_QUEUE_FRAMES)
    }

    /// Create a sink whose writer queue holds `queue_frames` frames.
    pub fn with_queue_frames(
        path: impl AsRef<Path>,
        format: AudioFormat,
        queue_frames: usize,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let spec = wav_spec(&format)?;
        let capacity = queue_capacity(queue_frames, format.channels)?;

        let writer = WavWriter::create(&path, spec).map_err(|source| SinkError::Create {
            path: path.clone(),
            source,
        })?;

        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        let flags = Arc::new(WriterFlags::default());
        let worker_flags = Arc::clone(&flags);
        let encoding = format.encoding;

        let worker = std::thread::Builder::new()
            .name("mixtap-wav-writer".into())
            .spawn(move || write_loop(writer, consumer, encoding, worker_flags))
            .map_err(|e| SinkError::Create {
                path: path.clone(),
                source: hound::Error::IoError(e),
            })?;

        tracing::debug!(
            "Opened WAV sink at {:?} ({}, queue of {} frames)",
            path,
            format,
            queue_frames
        );

        Ok(Self {
            path,
            channels: format.channels,
            producer,
            writer_thread: worker.thread().clone(),
            worker: Some(worker),
            flags,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the writer thread hit an I/O error and stopped writing.
    pub fn has_failed(&self) -> bool {
        self.flags.failed.load(Ordering::Acquire)
    }

    /// Wait for queued samples to land and fix up the header.
    pub fn finalize(mut self) -> Result<(), SinkError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // The writer drains what is queued before it sees the flag.
        self.flags.closed.store(true, Ordering::Release);
        self.writer_thread.unpark();
        match worker.join() {
            Ok(result) => result.map_err(SinkError::Finalize),
            Err(_) => Err(SinkError::Closed),
        }
    }
}

impl AudioFileSink for WavSink {
    fn write(&mut self, buffer: &PcmBuffer) -> Result<(), SinkError> {
        if buffer.channels() != self.channels {
            return Err(SinkError::ChannelMismatch {
                expected: self.channels,
                actual: buffer.channels(),
            });
        }
        if self.worker.is_none() || self.has_failed() {
            return Err(SinkError::Closed);
        }
        if buffer.is_empty() {
            return Ok(());
        }

        let samples = buffer.samples();
        // Whole buffers only, so frames never split across a drop.
        if self.producer.vacant_len() < samples.len() {
            return Err(SinkError::QueueFull {
                frames: buffer.frame_count(),
            });
        }
        self.producer.push_slice(samples);
        self.writer_thread.unpark();
        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!("Failed to finalize {:?}: {}", self.path, e);
        }
    }
}

fn queue_capacity(queue_frames: usize, channels: u16) -> Result<usize, SinkError> {
    if queue_frames == 0 || queue_frames > MAX_QUEUE_FRAMES {
        return Err(SinkError::InvalidQueueSize(queue_frames));
    }
    queue_frames
        .checked_mul(usize::from(channels))
        .ok_or(SinkError::InvalidQueueSize(queue_frames))
}

fn wav_spec(format: &AudioFormat) -> Result<WavSpec, SinkError> {
    format.validate().map_err(SinkError::UnsupportedFormat)?;

    let sample_format = if format.encoding.is_float() {
        SampleFormat::Float
    } else {
        SampleFormat::Int
    };

    Ok(WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample(),
        sample_format,
    })
}

fn write_loop(
    mut writer: Writer,
    mut consumer: HeapCons<f32>,
    encoding: SampleEncoding,
    flags: Arc<WriterFlags>,
) -> Result<(), hound::Error> {
    let mut chunk = vec![0.0f32; WRITE_CHUNK];
    loop {
        // Read before draining: everything pushed ahead of close is written.
        let closed = flags.closed.load(Ordering::Acquire);
        loop {
            let n = consumer.pop_slice(&mut chunk);
            if n == 0 {
                break;
            }
            if let Err(e) = write_samples(&mut writer, &chunk[..n], encoding) {
                flags.failed.store(true, Ordering::Release);
                // Keep what made it to disk readable.
                let _ = writer.finalize();
                return Err(e);
            }
        }
        if closed {
            break;
        }
        std::thread::park_timeout(IDLE_WAIT);
    }
    writer.finalize()
}

fn write_samples(
    writer: &mut Writer,
    samples: &[f32],
    encoding: SampleEncoding,
) -> Result<(), hound::Error> {
    match encoding {
        SampleEncoding::Float32 => {
            for &sample in samples {
                writer.write_sample(sample)?;
            }
        }
        SampleEncoding::Int16 => {
            for &sample in samples {
                let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(amplitude)?;
            }
        }
        SampleEncoding::Int24 => {
            const INT24_MAX: f32 = 8_388_607.0;
            for &sample in samples {
                writer.write_sample((sample.clamp(-1.0, 1.0) * INT24_MAX) as i32)?;
            }
        }
        SampleEncoding::Int32 => {
            for &sample in samples {
                let amplitude = f64::from(sample.clamp(-1.0, 1.0)) * f64::from(i32::MAX);
                writer.write_sample(amplitude as i32)?;
            }
        }
    }
    Ok(())
}

/// Default factory: WAV files via [`WavSink`].
#[derive(Debug, Clone, Copy)]
pub struct WavSinkFactory {
    queue_frames: usize,
}

impl WavSinkFactory {
    pub fn with_queue_frames(queue_frames: usize) -> Self {
        Self { queue_frames }
    }
}

impl Default for WavSinkFactory {
    fn default() -> Self {
        Self::with_queue_frames(DEFAULT_QUEUE_FRAMES)
    }
}

impl SinkFactory for WavSinkFactory {
    fn create(
        &self,
        path: &Path,
        format: &AudioFormat,
    ) -> Result<Box<dyn AudioFileSink>, SinkError> {
        let sink = WavSink::with_queue_frames(path, *format, self.queue_frames)?;
        Ok(Box::new(sink))
    }
}
