use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, GrayImage};
use rand::rngs::StdRng;
use rand::Rng;

use crate::channels::{validate_channels, ChannelSpec, FallbackGenerator, ValueExtractor};
use crate::models::{ReadingSource, SensorSample};
use crate::sampling::Frame;

use super::TextRecognizer;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Turns frames into fully populated samples.
///
/// Extraction misses and recognizer errors degrade to fallback readings, so
/// `build` never fails.
pub struct SensorSampleBuilder<R: Rng = StdRng> {
    recognizer: Arc<dyn TextRecognizer>,
    channels: Vec<(ChannelSpec, ValueExtractor)>,
    fallback: FallbackGenerator<R>,
}

impl<R: Rng> SensorSampleBuilder<R> {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        channels: &[ChannelSpec],
        fallback: FallbackGenerator<R>,
    ) -> Result<Self> {
        validate_channels(channels)?;
        let channels = channels
            .iter()
            .map(|spec| (spec.clone(), ValueExtractor::for_channel(spec)))
            .collect();

        Ok(Self {
            recognizer,
            channels,
            fallback,
        })
    }

    pub fn build(&mut self, frame: &Frame) -> SensorSample {
        let timestamp = SensorSample::now_timestamp();
        let gray = to_grayscale(frame);

        let text = match self.recognizer.recognize(&gray) {
            Ok(text) => text,
            Err(err) => {
                log_warn!("OCR failed on frame {}: {err:#}", frame.index);
                String::new()
            }
        };

        let sample = SensorSample::from_readings(timestamp, self.readings_from_text(&text));
        if sample.fallback_count() > 0 {
            log_info!(
                "Frame {}: {} of {} channels synthesized",
                frame.index,
                sample.fallback_count(),
                self.channels.len()
            );
        }
        sample
    }

    /// Extracts each channel from `text`, filling misses from the fallback generator.
    pub fn readings_from_text(&mut self, text: &str) -> [(f64, ReadingSource); 4] {
        let mut readings = [(0.0, ReadingSource::Fallback); 4];
        for (spec, extractor) in &self.channels {
            readings[spec.kind.index()] = match extractor.extract(text) {
                Some(value) => (value, ReadingSource::Extracted),
                None => (self.fallback.generate(spec), ReadingSource::Fallback),
            };
        }
        readings
    }
}

fn to_grayscale(frame: &Frame) -> GrayImage {
    DynamicImage::ImageRgb8(frame.image.clone()).to_luma8()
}
