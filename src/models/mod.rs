mod run_config;
mod sample;

pub use run_config::{default_base_name, RunConfig, DEFAULT_SAMPLING_INTERVAL};
pub use sample::{ReadingSource, SensorSample, TIMESTAMP_FORMAT};
