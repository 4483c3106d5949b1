use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use tokio::sync::mpsc;

use sensorlog_lib::{
    init_logging, models::default_base_name, settings::sampling_interval, DefaultSourceOpener,
    RunConfig, RunEvent, RunOutcome, SamplingController, SettingsStore, TesseractRecognizer,
};

/// Extract sensor readings from a monitoring video into CSV and text logs
#[derive(Parser, Debug)]
#[command(name = "sensorlog", version, about, long_about = None)]
struct Cli {
    /// Video file, or a directory of frame images
    video: String,

    /// Folder the .csv and .txt logs are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Base file name for both logs (default: sensorlog_<date>_<time>)
    #[arg(short, long)]
    name: Option<String>,

    /// Seconds between sampled frames (overrides settings)
    #[arg(short, long)]
    interval: Option<f64>,

    /// Path to a JSON settings file
    #[arg(long, env = "SENSORLOG_SETTINGS", default_value = "sensorlog.json")]
    settings: PathBuf,

    /// Seed for synthetic fallback readings (overrides settings)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let settings = SettingsStore::new(cli.settings.clone())?.settings();
    let interval = match cli.interval {
        Some(secs) => sampling_interval(secs)?,
        None => settings.sampling_interval()?,
    };

    let config = RunConfig::new(
        cli.video,
        cli.output_dir,
        cli.name.unwrap_or_else(default_base_name),
    )
    .with_interval(interval);

    let opener = Arc::new(DefaultSourceOpener::new(
        settings.ffmpeg_cmd.clone(),
        settings.ffprobe_cmd.clone(),
    ));
    let recognizer = Arc::new(TesseractRecognizer::new(
        settings.tesseract_cmd.clone(),
        settings.tesseract_lang.clone(),
    ));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut controller = SamplingController::new(opener, recognizer, tx)
        .with_channels(settings.channels.clone())
        .with_fallback_seed(cli.seed.or(settings.fallback_seed));

    if let Err(err) = controller.start(config).await {
        bail!("{err}");
    }

    let mut stop_requested = false;
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    RunEvent::Started { run_id, video, csv_path, text_path } => {
                        info!("Run {run_id}: analysing {video}");
                        println!("Starting analysis of {video}...");
                        println!("Writing {} and {}", csv_path.display(), text_path.display());
                    }
                    RunEvent::Sample(sample) => println!("{}", sample.display_line()),
                    RunEvent::Finished { outcome, samples_written, .. } => {
                        return finish(&mut controller, outcome, samples_written).await;
                    }
                }
            }
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal.context("failed to listen for Ctrl+C")?;
                warn!("Stop requested; finishing the current sample");
                stop_requested = true;
                controller.request_stop();
            }
        }
    }

    bail!("sampling worker ended without reporting an outcome")
}

async fn finish(
    controller: &mut SamplingController,
    outcome: RunOutcome,
    samples_written: u64,
) -> Result<()> {
    controller.join().await?;
    match outcome {
        RunOutcome::Completed => {
            println!("Video complete. {samples_written} samples written.");
            Ok(())
        }
        RunOutcome::Cancelled => {
            println!("Stopped. {samples_written} samples written.");
            Ok(())
        }
        RunOutcome::Failed(cause) => {
            error!("Run failed: {cause}");
            bail!("{cause}")
        }
    }
}
