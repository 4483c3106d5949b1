mod builder;
mod tesseract;

use anyhow::Result;
use image::GrayImage;

pub use builder::SensorSampleBuilder;
pub use tesseract::TesseractRecognizer;

/// OCR capability: turns a grayscale frame into raw text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String>;
}
