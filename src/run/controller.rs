use std::sync::Arc;

use chrono::Local;
use log::{info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::channels::{default_channels, ChannelSpec, FallbackGenerator};
use crate::error::RunError;
use crate::models::RunConfig;
use crate::recognition::{SensorSampleBuilder, TextRecognizer};
use crate::sampling::{FrameSampler, SourceOpener};
use crate::sinks::DualSinkLogger;

use super::events::{RunEvent, RunOutcome};
use super::loop_worker::{sampling_loop, RunContext};
use super::state::{RunState, RunStatus};

/// Starts, stops and reports on sampling runs, one at a time.
///
/// Progress is delivered on the `RunEvent` channel given at construction.
/// Cancellation is cooperative: a stop request takes effect between samples.
pub struct SamplingController {
    state: Arc<Mutex<RunState>>,
    events: mpsc::UnboundedSender<RunEvent>,
    opener: Arc<dyn SourceOpener>,
    recognizer: Arc<dyn TextRecognizer>,
    channels: Vec<ChannelSpec>,
    fallback_seed: Option<u64>,
    handle: Option<JoinHandle<RunOutcome>>,
    cancel_token: Option<CancellationToken>,
}

impl SamplingController {
    pub fn new(
        opener: Arc<dyn SourceOpener>,
        recognizer: Arc<dyn TextRecognizer>,
        events: mpsc::UnboundedSender<RunEvent>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RunState::new())),
            events,
            opener,
            recognizer,
            channels: default_channels(),
            fallback_seed: None,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn with_channels(mut self, channels: Vec<ChannelSpec>) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_fallback_seed(mut self, seed: Option<u64>) -> Self {
        self.fallback_seed = seed;
        self
    }

    pub async fn snapshot(&self) -> RunState {
        self.state.lock().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    /// Opens the source and sinks and spawns the sampling worker.
    ///
    /// Returns the new run's id. Rejected while another run is active; if the
    /// source or sinks cannot be opened the run goes straight to `Failed` and
    /// the observer is told why.
    pub async fn start(&mut self, config: RunConfig) -> Result<String, RunError> {
        config.validate()?;

        // A worker that died without recording an outcome still shows as
        // running until it is reaped.
        if self.handle.as_ref().is_some_and(|handle| handle.is_finished()) {
            if let Err(err) = self.reap().await {
                warn!("previous run: {err}");
            }
        }
        self.state.lock().await.ensure_can_start()?;

        if let Err(err) = self.reap().await {
            warn!("previous run: {err}");
        }
        self.cancel_token = None;

        let builder = SensorSampleBuilder::new(
            Arc::clone(&self.recognizer),
            &self.channels,
            FallbackGenerator::from_seed_option(self.fallback_seed),
        )
        .map_err(|err| RunError::InvalidConfig(format!("{err:#}")))?;

        let run_id = Uuid::new_v4().to_string();
        let csv_path = config.csv_path();
        let text_path = config.text_path();

        let (sampler, sink) = match self.open_resources(&config).await {
            Ok(opened) => opened,
            Err(err) => {
                let cause = err.to_string();
                self.state
                    .lock()
                    .await
                    .fail_to_start(run_id.clone(), cause.clone(), Local::now())?;
                let _ = self.events.send(RunEvent::Finished {
                    run_id,
                    outcome: RunOutcome::Failed(cause),
                    samples_written: 0,
                });
                return Err(err);
            }
        };

        self.state.lock().await.begin(run_id.clone(), Local::now())?;
        info!(
            "Starting run {} for {} -> {}",
            run_id,
            config.video,
            csv_path.display()
        );
        let _ = self.events.send(RunEvent::Started {
            run_id: run_id.clone(),
            video: config.video.clone(),
            csv_path,
            text_path,
        });

        let cancel_token = CancellationToken::new();
        let ctx = RunContext {
            run_id: run_id.clone(),
            interval: config.sampling_interval,
            sampler,
            sink,
            builder: Some(builder),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        };

        self.handle = Some(tokio::spawn(sampling_loop(ctx, cancel_token.clone())));
        self.cancel_token = Some(cancel_token);
        Ok(run_id)
    }

    /// Signals the active run to stop after its in-flight sample.
    pub fn request_stop(&self) {
        if let Some(token) = &self.cancel_token {
            token.cancel();
            info!("Stop requested for active run");
        }
    }

    /// Requests a stop and waits for the worker to release its resources.
    pub async fn stop(&mut self) -> Result<RunStatus, RunError> {
        self.request_stop();
        self.join().await
    }

    /// Waits for the active run to end on its own.
    pub async fn join(&mut self) -> Result<RunStatus, RunError> {
        let reaped = self.reap().await;
        self.cancel_token = None;
        reaped?;
        Ok(self.state.lock().await.status)
    }

    /// Awaits the worker task. If it died before recording an outcome the run
    /// is marked `Failed` and the observer is told.
    async fn reap(&mut self) -> Result<(), RunError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let Err(err) = handle.await else {
            return Ok(());
        };

        let cause = format!("sampling task ended abnormally: {err}");
        let finished = {
            let mut state = self.state.lock().await;
            state
                .finish(&RunOutcome::Failed(cause.clone()), Local::now())
                .then(|| (state.run_id.clone().unwrap_or_default(), state.samples_written))
        };
        if let Some((run_id, samples_written)) = finished {
            let _ = self.events.send(RunEvent::Finished {
                run_id,
                outcome: RunOutcome::Failed(cause.clone()),
                samples_written,
            });
        }
        Err(RunError::Worker(cause))
    }

    async fn open_resources(
        &self,
        config: &RunConfig,
    ) -> Result<(FrameSampler, DualSinkLogger), RunError> {
        let opener = Arc::clone(&self.opener);
        let video = config.video.clone();
        let csv_path = config.csv_path();
        let text_path = config.text_path();

        tokio::task::spawn_blocking(move || -> Result<_, RunError> {
            let mut sampler = FrameSampler::new(video);
            sampler.open(opener.as_ref())?;
            let sink = DualSinkLogger::open(&csv_path, &text_path)?;
            Ok((sampler, sink))
        })
        .await
        .map_err(|err| RunError::Worker(err.to_string()))?
    }
}

impl Drop for SamplingController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeOpener, GatedRecognizer, ScriptedRecognizer};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn controller(
        opener: Arc<FakeOpener>,
        text: &str,
    ) -> (SamplingController, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller =
            SamplingController::new(opener, Arc::new(ScriptedRecognizer::always(text)), tx)
                .with_fallback_seed(Some(5));
        (controller, rx)
    }

    fn config(dir: &Path, interval: Duration) -> RunConfig {
        RunConfig::new("clip.mp4", dir, "plants").with_interval(interval)
    }

    /// Collects events until `Finished`, returning the samples seen and the outcome.
    async fn drain(rx: &mut mpsc::UnboundedReceiver<RunEvent>) -> (usize, Option<RunOutcome>) {
        let mut samples = 0;
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::Sample(_) => samples += 1,
                RunEvent::Finished { outcome, .. } => return (samples, Some(outcome)),
                RunEvent::Started { .. } => {}
            }
        }
        (samples, None)
    }

    fn data_rows(path: &Path) -> usize {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.records().map(|r| r.unwrap()).count()
    }

    fn text_lines(path: &Path) -> usize {
        // Title and rule lines precede the samples.
        fs::read_to_string(path).unwrap().lines().count() - 2
    }

    #[tokio::test]
    async fn test_run_completes_when_source_exhausted() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(FakeOpener::with_frames(4));
        let (mut controller, mut rx) =
            controller(opener.clone(), "Temperature: 23.4 Soil Moisture 55");

        let cfg = config(dir.path(), Duration::ZERO);
        controller.start(cfg.clone()).await.unwrap();

        let (samples, outcome) = drain(&mut rx).await;
        assert_eq!(samples, 4);
        assert_eq!(outcome, Some(RunOutcome::Completed));

        assert_eq!(controller.join().await.unwrap(), RunStatus::Completed);
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.samples_written, 4);
        assert_eq!(data_rows(&cfg.csv_path()), 4);
        assert_eq!(text_lines(&cfg.text_path()), 4);
        assert_eq!(opener.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_n_samples_keeps_exactly_n_rows() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(FakeOpener::with_frames(100));
        let (mut controller, mut rx) = controller(opener.clone(), "");

        let cfg = config(dir.path(), Duration::from_secs(1));
        controller.start(cfg.clone()).await.unwrap();

        let mut seen = 0;
        while seen < 3 {
            if let Some(RunEvent::Sample(_)) = rx.recv().await {
                seen += 1;
            }
        }

        assert_eq!(controller.stop().await.unwrap(), RunStatus::Cancelled);

        let (late_samples, outcome) = drain(&mut rx).await;
        assert_eq!(late_samples, 0);
        assert_eq!(outcome, Some(RunOutcome::Cancelled));
        assert_eq!(controller.snapshot().await.samples_written, 3);
        assert_eq!(data_rows(&cfg.csv_path()), 3);
        assert_eq!(text_lines(&cfg.text_path()), 3);
        assert_eq!(opener.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_rejected_while_running() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(FakeOpener::with_frames(100));
        let (mut controller, mut rx) = controller(opener, "");

        controller
            .start(config(dir.path(), Duration::from_secs(1)))
            .await
            .unwrap();
        loop {
            if let Some(RunEvent::Sample(_)) = rx.recv().await {
                break;
            }
        }

        let second = RunConfig::new("clip.mp4", dir.path(), "other");
        let err = controller.start(second).await.unwrap_err();
        assert!(matches!(err, RunError::AlreadyRunning));
        assert!(!dir.path().join("other.csv").exists());
        assert_eq!(controller.snapshot().await.samples_written, 1);

        assert_eq!(controller.stop().await.unwrap(), RunStatus::Cancelled);
        assert_eq!(controller.snapshot().await.samples_written, 1);
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_running() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(FakeOpener::with_frames(1));
        let (mut controller, mut rx) = controller(opener, "");

        let cfg = RunConfig::new("missing.mp4", dir.path(), "plants");
        let err = controller.start(cfg.clone()).await.unwrap_err();
        assert!(matches!(err, RunError::SourceUnavailable { .. }));

        let (samples, outcome) = drain(&mut rx).await;
        assert_eq!(samples, 0);
        assert!(matches!(outcome, Some(RunOutcome::Failed(_))));

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, RunStatus::Failed);
        assert!(snapshot.failure.unwrap().contains("missing.mp4"));
        assert!(!cfg.csv_path().exists());
    }

    #[tokio::test]
    async fn test_unwritable_output_fails_and_releases_source() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(FakeOpener::with_frames(1));
        let (mut controller, mut rx) = controller(opener.clone(), "");

        let cfg = RunConfig::new("clip.mp4", dir.path().join("absent"), "plants");
        let err = controller.start(cfg).await.unwrap_err();
        assert!(matches!(err, RunError::SinkUnavailable { .. }));
        assert_eq!(opener.released(), 1);

        let (_, outcome) = drain(&mut rx).await;
        assert!(matches!(outcome, Some(RunOutcome::Failed(_))));
        assert_eq!(controller.snapshot().await.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_config_leaves_controller_idle() {
        let dir = tempdir().unwrap();
        let (mut controller, _rx) = controller(Arc::new(FakeOpener::with_frames(1)), "");

        let err = controller
            .start(RunConfig::new("clip.mp4", dir.path(), "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidConfig(_)));
        assert_eq!(controller.snapshot().await.status, RunStatus::Idle);
    }

    #[tokio::test]
    async fn test_new_run_after_completion() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(FakeOpener::with_frames(2));
        let (mut controller, mut rx) = controller(opener.clone(), "");

        controller
            .start(config(dir.path(), Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(drain(&mut rx).await.1, Some(RunOutcome::Completed));

        let second = RunConfig::new("clip.mp4", dir.path(), "second").with_interval(Duration::ZERO);
        let first_id = controller.snapshot().await.run_id;
        let second_id = controller.start(second.clone()).await.unwrap();
        assert_eq!(drain(&mut rx).await, (2, Some(RunOutcome::Completed)));
        assert_ne!(first_id.as_deref(), Some(second_id.as_str()));
        assert_eq!(data_rows(&second.csv_path()), 2);
        assert_eq!(opener.released(), 2);
    }

    #[tokio::test]
    async fn test_stop_during_recognition_writes_in_flight_sample() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(FakeOpener::with_frames(100));
        let (recognizer, gate) = GatedRecognizer::new("Temperature: 19.25");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = SamplingController::new(opener.clone(), Arc::new(recognizer), tx)
            .with_fallback_seed(Some(5));

        let cfg = config(dir.path(), Duration::ZERO);
        controller.start(cfg.clone()).await.unwrap();

        let entered = gate.entered;
        tokio::task::spawn_blocking(move || entered.recv())
            .await
            .unwrap()
            .unwrap();

        controller.request_stop();
        gate.release.send(()).unwrap();

        assert_eq!(controller.join().await.unwrap(), RunStatus::Cancelled);
        let (samples, outcome) = drain(&mut rx).await;
        assert_eq!(samples, 1);
        assert_eq!(outcome, Some(RunOutcome::Cancelled));
        assert_eq!(controller.snapshot().await.samples_written, 1);
        assert_eq!(data_rows(&cfg.csv_path()), 1);
        assert_eq!(text_lines(&cfg.text_path()), 1);
        assert!(fs::read_to_string(cfg.text_path())
            .unwrap()
            .contains("Temp: 19.25°C"));
        assert_eq!(opener.released(), 1);
    }

    #[tokio::test]
    async fn test_crashed_worker_is_marked_failed_and_allows_restart() {
        let dir = tempdir().unwrap();
        let opener = FakeOpener {
            panic_on_release: true,
            ..FakeOpener::with_frames(1)
        };
        let (mut controller, mut rx) = controller(Arc::new(opener), "");

        controller
            .start(config(dir.path(), Duration::ZERO))
            .await
            .unwrap();

        let err = controller.join().await.unwrap_err();
        assert!(matches!(err, RunError::Worker(_)));
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, RunStatus::Failed);
        assert!(snapshot.failure.unwrap().contains("abnormally"));

        let (samples, outcome) = drain(&mut rx).await;
        assert_eq!(samples, 1);
        assert!(matches!(outcome, Some(RunOutcome::Failed(_))));

        let second = RunConfig::new("clip.mp4", dir.path(), "again").with_interval(Duration::ZERO);
        assert!(controller.start(second).await.is_ok());
        assert!(matches!(controller.join().await, Err(RunError::Worker(_))));
    }
}
