use regex::{Regex, RegexBuilder};

use super::ChannelSpec;

/// Pulls one channel's numeric reading out of recognized text.
///
/// Matches `label`, an optional `:` or `-`, optional whitespace and a decimal
/// number of ASCII digits. When a unit is configured it must follow the
/// number, optionally after whitespace. Matching ignores case and the first
/// match wins.
#[derive(Debug, Clone)]
pub struct ValueExtractor {
    pattern: Option<Regex>,
}

impl ValueExtractor {
    pub fn new(label: &str, unit: Option<&str>) -> Self {
        Self {
            pattern: build_pattern(label, unit),
        }
    }

    pub fn for_channel(channel: &ChannelSpec) -> Self {
        Self::new(&channel.label, channel.unit.as_deref())
    }

    pub fn extract(&self, body: &str) -> Option<f64> {
        let captures = self.pattern.as_ref()?.captures(body)?;
        captures.get(1)?.as_str().parse().ok()
    }
}

/// One-shot form of [`ValueExtractor`] for callers without a cached pattern.
pub fn extract_value(label: &str, body: &str, unit: Option<&str>) -> Option<f64> {
    ValueExtractor::new(label, unit).extract(body)
}

fn build_pattern(label: &str, unit: Option<&str>) -> Option<Regex> {
    let mut pattern = format!(r"{}[:\-]?\s*([0-9]+(?:\.[0-9]+)?)", regex::escape(label));
    if let Some(unit) = unit.filter(|u| !u.is_empty()) {
        pattern.push_str(r"\s*");
        pattern.push_str(&regex::escape(unit));
    }

    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}
