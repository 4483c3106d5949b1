use std::path::PathBuf;

use serde::Serialize;

use crate::models::SensorSample;

use super::state::RunStatus;

/// How a run ended. Failures carry a single human-readable cause.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "cause")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Completed => RunStatus::Completed,
            RunOutcome::Cancelled => RunStatus::Cancelled,
            RunOutcome::Failed(_) => RunStatus::Failed,
        }
    }
}

/// Progress stream delivered to the observer of a [`SamplingController`](super::SamplingController).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum RunEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        run_id: String,
        video: String,
        csv_path: PathBuf,
        text_path: PathBuf,
    },
    Sample(SensorSample),
    #[serde(rename_all = "camelCase")]
    Finished {
        run_id: String,
        outcome: RunOutcome,
        samples_written: u64,
    },
}
