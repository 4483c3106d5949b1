//! Samples on-screen sensor readings from a video.
//!
//! Frames are taken at a fixed interval, run through OCR, and the four sensor
//! channels are parsed out of the recognized text. Channels the OCR misses are
//! filled with synthetic values so every sample is complete. Each sample is
//! written to `<base>.csv` and `<base>.txt` and streamed to an observer.

pub mod channels;
pub mod error;
pub mod models;
pub mod recognition;
pub mod run;
pub mod sampling;
pub mod settings;
pub mod sinks;
mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use channels::{ChannelKind, ChannelSpec, FallbackGenerator, FallbackRange, ValueExtractor};
pub use error::RunError;
pub use models::{ReadingSource, RunConfig, SensorSample};
pub use recognition::{SensorSampleBuilder, TesseractRecognizer, TextRecognizer};
pub use run::{RunEvent, RunOutcome, RunState, RunStatus, SamplingController};
pub use sampling::{DefaultSourceOpener, FrameSampler, FrameSource, SourceOpener};
pub use settings::{Settings, SettingsStore};
pub use sinks::DualSinkLogger;
pub use utils::init_logging;
