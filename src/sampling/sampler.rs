use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::{sleep_until, Instant};

use crate::error::RunError;

use super::{Frame, FrameSource, SourceOpener};

/// A frame handed out by the sampler along with the time since the sampler opened.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub frame: Frame,
    pub elapsed: Duration,
}

/// Paced, single-pass reader over a [`FrameSource`].
///
/// Once the source reports end of stream, fails to decode, or is closed, the
/// sampler stays exhausted.
pub struct FrameSampler {
    locator: String,
    source: Option<Box<dyn FrameSource>>,
    opened_at: Option<Instant>,
    last_returned: Option<Instant>,
    frames_returned: u64,
    exhausted: bool,
}

impl FrameSampler {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            source: None,
            opened_at: None,
            last_returned: None,
            frames_returned: 0,
            exhausted: false,
        }
    }

    pub fn open(&mut self, opener: &dyn SourceOpener) -> Result<(), RunError> {
        let source = opener
            .open(&self.locator)
            .map_err(|err| RunError::SourceUnavailable {
                locator: self.locator.clone(),
                reason: format!("{err:#}"),
            })?;

        info!("Opened video source {}", self.locator);
        self.source = Some(source);
        self.opened_at = Some(Instant::now());
        self.exhausted = false;
        Ok(())
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn frames_returned(&self) -> u64 {
        self.frames_returned
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted || self.source.is_none()
    }

    /// Waits until `min_interval` has passed since the previous frame, then
    /// decodes the next one. `None` marks the end of the sequence.
    pub async fn next_frame(&mut self, min_interval: Duration) -> Option<SampledFrame> {
        if self.is_exhausted() {
            return None;
        }

        if let Some(last) = self.last_returned {
            sleep_until(last + min_interval).await;
        }

        let mut source = self.source.take()?;
        let decoded = tokio::task::spawn_blocking(move || {
            let result = source.read_frame();
            (source, result)
        })
        .await;

        let image = match decoded {
            Ok((source, Ok(Some(image)))) => {
                self.source = Some(source);
                image
            }
            Ok((source, Ok(None))) => {
                debug!(
                    "Video source {} exhausted after {} frames",
                    self.locator, self.frames_returned
                );
                drop(source);
                self.exhausted = true;
                return None;
            }
            Ok((source, Err(err))) => {
                warn!("Decoding {} failed, ending stream: {err:#}", self.locator);
                drop(source);
                self.exhausted = true;
                return None;
            }
            Err(join_err) => {
                error!("Frame decode worker for {} failed: {join_err}", self.locator);
                self.exhausted = true;
                return None;
            }
        };

        let now = Instant::now();
        let elapsed = self
            .opened_at
            .map(|opened| now.duration_since(opened))
            .unwrap_or_default();
        self.last_returned = Some(now);

        let frame = Frame {
            index: self.frames_returned,
            image,
        };
        self.frames_returned += 1;

        Some(SampledFrame { frame, elapsed })
    }

    pub fn close(&mut self) {
        if self.source.take().is_some() {
            info!("Released video source {}", self.locator);
        }
        self.exhausted = true;
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.close();
    }
}
