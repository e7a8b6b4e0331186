pub mod buffer;
pub mod format;
pub mod sink;
pub mod wav_sink;

pub use buffer::{AudioTime, PcmBuffer};
pub use format::{AudioFormat, SampleEncoding};
pub use sink::{AudioFileSink, SinkFactory};
pub use wav_sink::{WavSink, WavSinkFactory};
