use std::path::PathBuf;

use thiserror::Error;

/// Failures that end (or prevent) a sampling run.
///
/// A missed OCR extraction is not represented here: the extractor returns
/// `None` and the builder substitutes a fallback reading.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not open video source '{locator}': {reason}")]
    SourceUnavailable { locator: String, reason: String },
    #[error("could not create output file {}: {source}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write sample: {0}")]
    WriteFailure(String),
    #[error("a sampling run is already active")]
    AlreadyRunning,
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),
    #[error("sampling worker stopped unexpectedly: {0}")]
    Worker(String),
}

impl From<csv::Error> for RunError {
    fn from(err: csv::Error) -> Self {
        RunError::WriteFailure(err.to_string())
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        RunError::WriteFailure(err.to_string())
    }
}
