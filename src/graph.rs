use crate::audio::{AudioFormat, AudioTime, PcmBuffer};
use crate::error::GraphError;

/// The mixer and output nodes expose a single bus.
pub const MIXER_BUS: usize = 0;

/// Largest tap block, in frames, a graph accepts.
pub const MAX_TAP_BUFFER_SIZE: usize = 1 << 20;

/// Observation callback installed on a node's output bus.
///
/// Runs on the audio thread: it must not block, log or panic.
pub type TapBlock = Box<dyn FnMut(&PcmBuffer, AudioTime) + Send>;

/// A running audio engine with a tappable mixer node.
pub trait AudioGraph {
    fn is_running(&self) -> bool;

    /// Output format of the main mixer node on `bus`.
    fn mixer_format(&self, bus: usize) -> Result<AudioFormat, GraphError>;

    /// Format of the output (device) node on `bus`.
    fn output_format(&self, bus: usize) -> Result<AudioFormat, GraphError>;

    /// Install `tap` on the mixer's `bus`, delivering blocks of `buffer_size`
    /// frames in `format`. Only one tap per bus; `buffer_size` must be in
    /// `1..=MAX_TAP_BUFFER_SIZE`.
    fn install_tap(
        &mut self,
        bus: usize,
        buffer_size: usize,
        format: AudioFormat,
        tap: TapBlock,
    ) -> Result<(), GraphError>;

    /// Remove the tap on `bus`, dropping its callback. No-op without a tap.
    fn remove_tap(&mut self, bus: usize);
}
