pub mod cpal_engine;
pub mod mixer;
pub mod offline;
pub mod source;

pub use cpal_engine::CpalEngine;
pub use mixer::MixerNode;
pub use offline::OfflineEngine;
pub use source::{SineSource, Source};
