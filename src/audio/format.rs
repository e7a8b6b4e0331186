use serde::{Deserialize, Serialize};
use std::fmt;

/// Sample encoding used when audio is persisted.
///
/// Buffers flowing through the graph are always interleaved `f32`; the encoding
/// only decides how the file sink stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    Int16,
    Int24,
    Int32,
    Float32,
}

impl SampleEncoding {
    pub fn bits_per_sample(self) -> u16 {
        match self {
            SampleEncoding::Int16 => 16,
            SampleEncoding::Int24 => 24,
            SampleEncoding::Int32 | SampleEncoding::Float32 => 32,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleEncoding::Float32)
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleEncoding::Int16 => "int16",
            SampleEncoding::Int24 => "int24",
            SampleEncoding::Int32 => "int32",
            SampleEncoding::Float32 => "float32",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, encoding: SampleEncoding) -> Self {
        Self {
            sample_rate,
            channels,
            encoding,
        }
    }

    /// Native format of the mix bus: interleaved 32-bit float.
    pub fn float32(sample_rate: u32, channels: u16) -> Self {
        Self::new(sample_rate, channels, SampleEncoding::Float32)
    }

    pub fn with_encoding(self, encoding: SampleEncoding) -> Self {
        Self { encoding, ..self }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.encoding.bits_per_sample()
    }

    /// Two formats can share a tap when rate and layout agree; encoding is a
    /// storage concern only.
    pub fn is_compatible(&self, other: &AudioFormat) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be non-zero".to_string());
        }
        if self.channels == 0 {
            return Err("channel count must be non-zero".to_string());
        }
        Ok(())
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::float32(44_100, 2)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}",
            self.sample_rate, self.channels, self.encoding
        )
    }
}
