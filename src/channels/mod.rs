pub mod extractor;
pub mod fallback;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub use extractor::{extract_value, ValueExtractor};
pub use fallback::FallbackGenerator;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ChannelKind {
    Temperature,
    SoilMoisture,
    Sunlight,
    NutrientLevel,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Temperature,
        ChannelKind::SoilMoisture,
        ChannelKind::Sunlight,
        ChannelKind::NutrientLevel,
    ];

    /// Position in the persisted column order.
    pub fn index(self) -> usize {
        match self {
            ChannelKind::Temperature => 0,
            ChannelKind::SoilMoisture => 1,
            ChannelKind::Sunlight => 2,
            ChannelKind::NutrientLevel => 3,
        }
    }
}

/// Inclusive bounds for synthetic readings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FallbackRange {
    pub min: f64,
    pub max: f64,
}

impl FallbackRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    pub kind: ChannelKind,
    /// Marker searched for in the recognized text.
    pub label: String,
    /// Suffix required right after the number, if any.
    #[serde(default)]
    pub unit: Option<String>,
    pub fallback_range: FallbackRange,
}

impl ChannelSpec {
    pub fn new(kind: ChannelKind, label: &str, unit: Option<&str>, range: FallbackRange) -> Self {
        Self {
            kind,
            label: label.to_string(),
            unit: unit.map(str::to_string),
            fallback_range: range,
        }
    }

    pub fn temperature() -> Self {
        Self::new(
            ChannelKind::Temperature,
            "Temperature",
            None,
            FallbackRange::new(15.0, 35.0),
        )
    }

    pub fn soil_moisture() -> Self {
        Self::new(
            ChannelKind::SoilMoisture,
            "Soil Moisture",
            None,
            FallbackRange::new(30.0, 80.0),
        )
    }

    pub fn sunlight() -> Self {
        Self::new(
            ChannelKind::Sunlight,
            "Sunlight",
            None,
            FallbackRange::new(4.0, 12.0),
        )
    }

    pub fn nutrient_level() -> Self {
        Self::new(
            ChannelKind::NutrientLevel,
            "Nutrient Level",
            None,
            FallbackRange::new(4.0, 10.0),
        )
    }
}

/// The four fixed channels, in persistence order.
pub fn default_channels() -> Vec<ChannelSpec> {
    vec![
        ChannelSpec::temperature(),
        ChannelSpec::soil_moisture(),
        ChannelSpec::sunlight(),
        ChannelSpec::nutrient_level(),
    ]
}

/// Every kind must appear exactly once so a built sample is always complete.
pub fn validate_channels(channels: &[ChannelSpec]) -> Result<()> {
    for kind in ChannelKind::ALL {
        let count = channels.iter().filter(|c| c.kind == kind).count();
        if count != 1 {
            bail!("channel {kind:?} configured {count} times, expected exactly once");
        }
    }

    if channels.len() != ChannelKind::ALL.len() {
        bail!("expected {} channels, got {}", ChannelKind::ALL.len(), channels.len());
    }

    for channel in channels {
        let range = channel.fallback_range;
        if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
            bail!(
                "channel '{}' has an invalid fallback range {}..={}",
                channel.label,
                range.min,
                range.max
            );
        }
        if channel.label.trim().is_empty() {
            bail!("channel {:?} has an empty label", channel.kind);
        }
    }

    Ok(())
}
