use std::process::Command;

use anyhow::{bail, Context, Result};
use image::{GrayImage, ImageFormat};
use log::debug;
use tempfile::Builder;

use super::TextRecognizer;

/// Runs the `tesseract` command-line tool on a temporary PNG of each frame.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    fn args<'a>(&'a self, image_path: &'a str) -> [&'a str; 4] {
        [image_path, "stdout", "-l", &self.language]
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let file = Builder::new()
            .prefix("sensorlog-frame-")
            .suffix(".png")
            .tempfile()
            .context("failed to create temporary frame file")?;
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .context("failed to write temporary frame file")?;

        let path = file.path().to_string_lossy().into_owned();
        let output = Command::new(&self.command)
            .args(self.args(&path))
            .output()
            .with_context(|| format!("failed to run {}", self.command))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR text ({} chars): {}", text.len(), text.trim());
        Ok(text)
    }
}
