use super::buffer::PcmBuffer;
use super::format::AudioFormat;
use crate::error::SinkError;
use std::path::Path;

/// Destination for recorded buffers.
///
/// `write` is called from the audio thread, once per delivered buffer and in
/// delivery order, so implementations must not block on I/O. Dropping the sink
/// flushes and closes the underlying file.
pub trait AudioFileSink: Send {
    fn write(&mut self, buffer: &PcmBuffer) -> Result<(), SinkError>;
}

/// Opens a sink for a destination path and storage format.
pub trait SinkFactory {
    fn create(&self, path: &Path, format: &AudioFormat)
    -> Result<Box<dyn AudioFileSink>, SinkError>;
}
