use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use log::{debug, warn};
use serde::Deserialize;

use super::FrameSource;

/// Streams raw RGB frames out of an `ffmpeg` child process.
pub struct FfmpegSource {
    command: String,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
}

impl FfmpegSource {
    pub fn open(path: &Path, ffmpeg_cmd: &str, ffprobe_cmd: &str) -> Result<Self> {
        let (width, height) = probe_dimensions(path, ffprobe_cmd)?;
        debug!("{} is {}x{}", path.display(), width, height);

        let mut command = Command::new(ffmpeg_cmd);
        command
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]);
        Self::spawn(command, width, height)
    }

    /// Runs `command`, which must write `width`x`height` rgb24 frames to stdout.
    fn spawn(mut command: Command, width: u32, height: u32) -> Result<Self> {
        let name = command.get_program().to_string_lossy().into_owned();
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {name}"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("{name} stdout was not captured"))?;

        // Drained on its own thread so a chatty decoder never blocks on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut captured = String::new();
                let _ = pipe.read_to_string(&mut captured);
                captured
            })
        });

        Ok(Self {
            command: name,
            child,
            stdout,
            stderr,
            width,
            height,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Stdout hit EOF: a clean exit ends the stream, anything else is an error
    /// carrying the decoder's own message.
    fn finish(&mut self) -> Result<Option<RgbImage>> {
        let status = self
            .child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.command))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if status.success() {
            return Ok(None);
        }
        bail!("{} exited with {status}: {}", self.command, stderr.trim())
    }
}

impl FrameSource for FfmpegSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let mut buf = vec![0u8; self.frame_len()];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => {}
            // A truncated trailing frame counts as end of stream.
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return self.finish(),
            Err(err) => return Err(err).context("failed to read frame from ffmpeg"),
        }

        RgbImage::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Err(err) = self.child.kill() {
            if err.kind() != ErrorKind::InvalidInput {
                warn!("Failed to stop {}: {err}", self.command);
            }
        }
        let _ = self.child.wait();
    }
}

fn probe_dimensions(path: &Path, ffprobe_cmd: &str) -> Result<(u32, u32)> {
    let output = Command::new(ffprobe_cmd)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:stream_tags=rotate:stream_side_data=rotation",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .with_context(|| format!("failed to run {ffprobe_cmd}"))?;

    if !output.status.success() {
        bail!(
            "{ffprobe_cmd} could not read {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.get("rotate").and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0)
    }
}

/// Parses ffprobe's JSON stream report into the dimensions ffmpeg will
/// decode to. ffmpeg auto-rotates, so a quarter turn swaps width and height.
pub fn parse_dimensions(raw: &str) -> Result<(u32, u32)> {
    let probe: ProbeOutput = serde_json::from_str(raw).context("unreadable ffprobe output")?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| anyhow!("no video stream found"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => (width, height),
        (width, height) => bail!(
            "video stream has empty dimensions {}x{}",
            width.unwrap_or(0),
            height.unwrap_or(0)
        ),
    };

    let quarter_turns = (stream.rotation() / 90.0).round() as i64;
    if quarter_turns.rem_euclid(2) == 1 {
        Ok((height, width))
    } else {
        Ok((width, height))
    }
}
