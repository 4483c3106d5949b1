//! Sensor sample data model.
//!
//! One timestamped reading per sampled frame. All four channels are always
//! populated; `provenance` records which values came from OCR and which were
//! synthesized.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::channels::ChannelKind;

/// Timestamp layout used by both sinks.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReadingSource {
    Extracted,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    pub timestamp: NaiveDateTime,
    pub temperature_c: f64,
    pub soil_moisture_pct: f64,
    pub sunlight_hours: f64,
    pub nutrient_level: f64,
    /// Per-channel origin, in `ChannelKind::ALL` order.
    pub provenance: [ReadingSource; 4],
}

impl SensorSample {
    /// Builds a sample from per-channel readings indexed by `ChannelKind::index`.
    pub fn from_readings(timestamp: NaiveDateTime, readings: [(f64, ReadingSource); 4]) -> Self {
        Self {
            timestamp: truncate_to_seconds(timestamp),
            temperature_c: readings[ChannelKind::Temperature.index()].0,
            soil_moisture_pct: readings[ChannelKind::SoilMoisture.index()].0,
            sunlight_hours: readings[ChannelKind::Sunlight.index()].0,
            nutrient_level: readings[ChannelKind::NutrientLevel.index()].0,
            provenance: readings.map(|(_, source)| source),
        }
    }

    pub fn now_timestamp() -> NaiveDateTime {
        truncate_to_seconds(Local::now().naive_local())
    }

    pub fn value(&self, kind: ChannelKind) -> f64 {
        match kind {
            ChannelKind::Temperature => self.temperature_c,
            ChannelKind::SoilMoisture => self.soil_moisture_pct,
            ChannelKind::Sunlight => self.sunlight_hours,
            ChannelKind::NutrientLevel => self.nutrient_level,
        }
    }

    pub fn source(&self, kind: ChannelKind) -> ReadingSource {
        self.provenance[kind.index()]
    }

    pub fn fallback_count(&self) -> usize {
        self.provenance
            .iter()
            .filter(|source| **source == ReadingSource::Fallback)
            .count()
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Human-readable line written to the text log and shown to observers.
    pub fn display_line(&self) -> String {
        format!(
            "{} | Temp: {:.2}°C | Moisture: {:.2}% | Sunlight: {:.2} hrs | Nutrients: {:.2}",
            self.formatted_timestamp(),
            self.temperature_c,
            self.soil_moisture_pct,
            self.sunlight_hours,
            self.nutrient_level
        )
    }
}

fn truncate_to_seconds(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}
