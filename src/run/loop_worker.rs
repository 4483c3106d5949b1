use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::models::SensorSample;
use crate::recognition::SensorSampleBuilder;
use crate::sampling::{Frame, FrameSampler};
use crate::sinks::DualSinkLogger;

use super::events::{RunEvent, RunOutcome};
use super::state::RunState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

/// Everything the worker owns for the duration of one run.
pub(crate) struct RunContext {
    pub run_id: String,
    pub interval: Duration,
    pub sampler: FrameSampler,
    pub sink: DualSinkLogger,
    pub builder: Option<SensorSampleBuilder>,
    pub state: Arc<Mutex<RunState>>,
    pub events: mpsc::UnboundedSender<RunEvent>,
}

pub(crate) async fn sampling_loop(mut ctx: RunContext, cancel_token: CancellationToken) -> RunOutcome {
    log_info!(
        "run {} sampling {} every {:?}",
        ctx.run_id,
        ctx.sampler.locator(),
        ctx.interval
    );

    let outcome = drive(&mut ctx, &cancel_token).await;

    ctx.sampler.close();
    ctx.sink.close();

    let samples_written = {
        let mut state = ctx.state.lock().await;
        state.finish(&outcome, Local::now());
        state.samples_written
    };

    match &outcome {
        RunOutcome::Completed => log_info!("run {} complete: {} samples", ctx.run_id, samples_written),
        RunOutcome::Cancelled => log_info!("run {} cancelled after {} samples", ctx.run_id, samples_written),
        RunOutcome::Failed(cause) => log_error!("run {} failed after {} samples: {cause}", ctx.run_id, samples_written),
    }

    let _ = ctx.events.send(RunEvent::Finished {
        run_id: ctx.run_id.clone(),
        outcome: outcome.clone(),
        samples_written,
    });

    outcome
}

async fn drive(ctx: &mut RunContext, cancel_token: &CancellationToken) -> RunOutcome {
    let mut observer_gone = false;
    loop {
        if cancel_token.is_cancelled() {
            return RunOutcome::Cancelled;
        }

        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return RunOutcome::Cancelled,
            next = ctx.sampler.next_frame(ctx.interval) => next,
        };

        let Some(sampled) = next else {
            return RunOutcome::Completed;
        };

        // Once a frame is in hand the sample is finished and written even if
        // a stop arrives meanwhile.
        let sample = match build_sample(&mut ctx.builder, sampled.frame).await {
            Ok(sample) => sample,
            Err(cause) => return RunOutcome::Failed(cause),
        };

        if let Err(err) = ctx.sink.write(&sample) {
            log_error!("run {} write failed: {err}", ctx.run_id);
            return RunOutcome::Failed(err.to_string());
        }

        ctx.state.lock().await.record_sample();
        if ctx.events.send(RunEvent::Sample(sample)).is_err() && !observer_gone {
            observer_gone = true;
            log_warn!("run {} observer dropped; continuing", ctx.run_id);
        }
    }
}

/// OCR is blocking, so the builder hops onto the blocking pool and back.
async fn build_sample(
    slot: &mut Option<SensorSampleBuilder>,
    frame: Frame,
) -> Result<SensorSample, String> {
    let mut builder = slot
        .take()
        .ok_or_else(|| "sample builder unavailable".to_string())?;

    let (builder, sample) = tokio::task::spawn_blocking(move || {
        let sample = builder.build(&frame);
        (builder, sample)
    })
    .await
    .map_err(|err| format!("sample builder stopped unexpectedly: {err}"))?;

    *slot = Some(builder);
    Ok(sample)
}
