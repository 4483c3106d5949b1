use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::RunError;

pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_secs(2);

/// Parameters for a single sampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub video: String,
    pub output_dir: PathBuf,
    pub base_name: String,
    pub sampling_interval: Duration,
}

impl RunConfig {
    pub fn new(
        video: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        base_name: impl Into<String>,
    ) -> Self {
        Self {
            video: video.into(),
            output_dir: output_dir.into(),
            base_name: base_name.into(),
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.sampling_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.video.trim().is_empty() {
            return Err(RunError::InvalidConfig("video locator is empty".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(RunError::InvalidConfig("output directory is empty".into()));
        }
        if self.base_name.trim().is_empty() {
            return Err(RunError::InvalidConfig("output file name is empty".into()));
        }
        Ok(())
    }

    pub fn csv_path(&self) -> PathBuf {
        self.output_path("csv")
    }

    pub fn text_path(&self) -> PathBuf {
        self.output_path("txt")
    }

    fn output_path(&self, extension: &str) -> PathBuf {
        Path::new(&self.output_dir).join(format!("{}.{}", self.base_name.trim(), extension))
    }
}

/// `sensorlog_YYYY-MM-DD_HH-MM` for the current local time.
pub fn default_base_name() -> String {
    format!("sensorlog_{}", Local::now().format("%Y-%m-%d_%H-%M"))
}
