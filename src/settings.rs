use std::time::Duration;
use std::{fs, path::PathBuf, sync::RwLock};

use anyhow::{anyhow, bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::channels::{default_channels, validate_channels, ChannelSpec};
use crate::models::DEFAULT_SAMPLING_INTERVAL;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub sampling_interval_secs: f64,
    pub tesseract_cmd: String,
    pub tesseract_lang: String,
    pub ffmpeg_cmd: String,
    pub ffprobe_cmd: String,
    /// Fixed seed for fallback readings; entropy when unset.
    pub fallback_seed: Option<u64>,
    pub channels: Vec<ChannelSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sampling_interval_secs: DEFAULT_SAMPLING_INTERVAL.as_secs_f64(),
            tesseract_cmd: "tesseract".into(),
            tesseract_lang: "eng".into(),
            ffmpeg_cmd: "ffmpeg".into(),
            ffprobe_cmd: "ffprobe".into(),
            fallback_seed: None,
            channels: default_channels(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        sampling_interval(self.sampling_interval_secs)?;
        validate_channels(&self.channels)
    }

    pub fn sampling_interval(&self) -> Result<Duration> {
        sampling_interval(self.sampling_interval_secs)
    }
}

pub fn sampling_interval(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        bail!("sampling interval must be a non-negative number of seconds, got {secs}");
    }
    Duration::try_from_secs_f64(secs).map_err(|err| anyhow!("invalid sampling interval {secs}: {err}"))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing file yields defaults; an
    /// unparsable or invalid one is logged and replaced by defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => match settings.validate() {
                    Ok(()) => settings,
                    Err(err) => {
                        warn!("Ignoring invalid settings in {}: {err:#}", path.display());
                        Settings::default()
                    }
                },
                Err(err) => {
                    warn!("Ignoring unparsable settings in {}: {err}", path.display());
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
