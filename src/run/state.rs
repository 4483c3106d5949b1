use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::RunError;

use super::events::RunOutcome;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::Idle
    }
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Cancelled | RunStatus::Failed
        )
    }
}

/// Lifecycle of the current (or most recent) run.
///
/// `Idle -> Running -> {Completed, Cancelled, Failed}`, plus `Idle -> Failed`
/// when the source or sinks cannot be opened. A terminal run may be replaced
/// by a new one; a running one may not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub status: RunStatus,
    pub run_id: Option<String>,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
    pub samples_written: u64,
    pub failure: Option<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn ensure_can_start(&self) -> Result<(), RunError> {
        if self.is_running() {
            return Err(RunError::AlreadyRunning);
        }
        Ok(())
    }

    pub fn begin(&mut self, run_id: String, started_at: DateTime<Local>) -> Result<(), RunError> {
        self.ensure_can_start()?;
        *self = Self {
            status: RunStatus::Running,
            run_id: Some(run_id),
            started_at: Some(started_at),
            ..Self::default()
        };
        Ok(())
    }

    /// Opening the source or sinks failed; the run never entered `Running`.
    pub fn fail_to_start(
        &mut self,
        run_id: String,
        cause: String,
        at: DateTime<Local>,
    ) -> Result<(), RunError> {
        self.ensure_can_start()?;
        *self = Self {
            status: RunStatus::Failed,
            run_id: Some(run_id),
            finished_at: Some(at),
            failure: Some(cause),
            ..Self::default()
        };
        Ok(())
    }

    pub fn record_sample(&mut self) {
        if self.is_running() {
            self.samples_written += 1;
        }
    }

    /// Moves a running run into the terminal state matching `outcome`.
    /// Returns false if no run was active.
    pub fn finish(&mut self, outcome: &RunOutcome, at: DateTime<Local>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = outcome.status();
        self.finished_at = Some(at);
        if let RunOutcome::Failed(cause) = outcome {
            self.failure = Some(cause.clone());
        }
        true
    }
}
