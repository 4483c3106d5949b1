use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::models::SensorSample;

pub const CSV_HEADER: [&str; 5] = [
    "Timestamp",
    "Temperature (°C)",
    "Soil Moisture (%)",
    "Sunlight (hrs/day)",
    "Nutrient Level (0–10)",
];

const TEXT_TITLE: &str = "Sensor Readings Log";

/// One CSV data row. Values are written at full precision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CsvRow {
    pub timestamp: String,
    pub temperature: f64,
    pub soil_moisture: f64,
    pub sunlight: f64,
    pub nutrient_level: f64,
}

impl From<&SensorSample> for CsvRow {
    fn from(sample: &SensorSample) -> Self {
        Self {
            timestamp: sample.formatted_timestamp(),
            temperature: sample.temperature_c,
            soil_moisture: sample.soil_moisture_pct,
            sunlight: sample.sunlight_hours,
            nutrient_level: sample.nutrient_level,
        }
    }
}

type SinkWriter = Box<dyn Write + Send>;

struct OpenSinks {
    csv: csv::Writer<SinkWriter>,
    text: BufWriter<SinkWriter>,
}

/// Writes every sample to `<base>.csv` and `<base>.txt`, flushing both per sample.
pub struct DualSinkLogger {
    csv_path: PathBuf,
    text_path: PathBuf,
    sinks: Option<OpenSinks>,
    rows_written: u64,
}

impl DualSinkLogger {
    /// Creates both files and writes their headers. If either file cannot be
    /// created, neither is left behind.
    pub fn open(csv_path: &Path, text_path: &Path) -> Result<Self, RunError> {
        let csv_file = create(csv_path)?;
        let text_file = match create(text_path) {
            Ok(file) => file,
            Err(err) => {
                drop(csv_file);
                if let Err(remove_err) = fs::remove_file(csv_path) {
                    error!("Failed to remove {}: {remove_err}", csv_path.display());
                }
                return Err(err);
            }
        };

        Self::from_writers(csv_path, text_path, Box::new(csv_file), Box::new(text_file))
    }

    /// Wraps already-open writers; `open` is the usual entry point.
    pub(crate) fn from_writers(
        csv_path: &Path,
        text_path: &Path,
        csv_out: SinkWriter,
        text_out: SinkWriter,
    ) -> Result<Self, RunError> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(csv_out);
        let mut text = BufWriter::new(text_out);

        csv.write_record(CSV_HEADER)
            .and_then(|_| csv.flush().map_err(csv::Error::from))
            .map_err(|err| sink_unavailable(csv_path, err.into()))?;
        writeln!(text, "{TEXT_TITLE}\n{}", "=".repeat(40))
            .and_then(|_| text.flush())
            .map_err(|err| sink_unavailable(text_path, err))?;

        info!(
            "Opened sinks {} and {}",
            csv_path.display(),
            text_path.display()
        );

        Ok(Self {
            csv_path: csv_path.to_path_buf(),
            text_path: text_path.to_path_buf(),
            sinks: Some(OpenSinks { csv, text }),
            rows_written: 0,
        })
    }

    pub fn write(&mut self, sample: &SensorSample) -> Result<(), RunError> {
        let sinks = self
            .sinks
            .as_mut()
            .ok_or_else(|| RunError::WriteFailure("sinks are closed".into()))?;

        sinks.csv.serialize(CsvRow::from(sample))?;
        sinks.csv.flush()?;

        writeln!(sinks.text, "{}", sample.display_line())?;
        sinks.text.flush()?;

        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn text_path(&self) -> &Path {
        &self.text_path
    }

    pub fn close(&mut self) {
        let Some(mut sinks) = self.sinks.take() else {
            return;
        };

        if let Err(err) = sinks.csv.flush() {
            error!("Failed to flush {}: {err}", self.csv_path.display());
        }
        if let Err(err) = sinks.text.flush() {
            error!("Failed to flush {}: {err}", self.text_path.display());
        }
        info!(
            "Closed sinks after {} rows ({})",
            self.rows_written,
            self.csv_path.display()
        );
    }
}

impl Drop for DualSinkLogger {
    fn drop(&mut self) {
        self.close();
    }
}

fn create(path: &Path) -> Result<File, RunError> {
    File::create(path).map_err(|err| sink_unavailable(path, err))
}

fn sink_unavailable(path: &Path, source: std::io::Error) -> RunError {
    RunError::SinkUnavailable {
        path: path.to_path_buf(),
        source,
    }
}
