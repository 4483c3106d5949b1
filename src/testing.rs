//! Deterministic stand-ins for the decoder and OCR collaborators.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use anyhow::{anyhow, Result};
use image::{GrayImage, RgbImage};

use crate::recognition::TextRecognizer;
use crate::sampling::{FrameSource, SourceOpener};

/// Yields `total` blank frames, optionally failing at a given index.
pub(crate) struct FakeSource {
    total: usize,
    served: usize,
    fail_at: Option<usize>,
    panic_on_release: bool,
    released: Arc<AtomicUsize>,
}

impl FrameSource for FakeSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if Some(self.served) == self.fail_at {
            return Err(anyhow!("corrupt packet"));
        }
        if self.served >= self.total {
            return Ok(None);
        }
        self.served += 1;
        Ok(Some(RgbImage::new(4, 4)))
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_release {
            panic!("decoder teardown crashed");
        }
    }
}

/// Opens a [`FakeSource`] for any locator except `missing.mp4`.
pub(crate) struct FakeOpener {
    pub total: usize,
    pub fail_at: Option<usize>,
    pub panic_on_release: bool,
    pub released: Arc<AtomicUsize>,
}

impl FakeOpener {
    pub(crate) fn with_frames(total: usize) -> Self {
        Self {
            total,
            fail_at: None,
            panic_on_release: false,
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl SourceOpener for FakeOpener {
    fn open(&self, locator: &str) -> Result<Box<dyn FrameSource>> {
        if locator == "missing.mp4" {
            return Err(anyhow!("no such file"));
        }
        Ok(Box::new(FakeSource {
            total: self.total,
            served: 0,
            fail_at: self.fail_at,
            panic_on_release: self.panic_on_release,
            released: Arc::clone(&self.released),
        }))
    }
}

/// Replays scripted OCR output; repeats the last entry once the script runs out.
pub(crate) struct ScriptedRecognizer {
    script: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub(crate) fn new(script: Vec<Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn always(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().map_err(|_| anyhow!("poisoned"))?;
        let next = self
            .script
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .pop_front();
        if let Some(entry) = next {
            *last = Some(entry);
        }
        match last.clone() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Ok(String::new()),
        }
    }
}

/// Blocks its first `recognize` call until released, announcing when it
/// starts. Later calls return immediately.
pub(crate) struct GatedRecognizer {
    text: String,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

/// Test-side handles for a [`GatedRecognizer`].
pub(crate) struct Gate {
    pub entered: mpsc::Receiver<()>,
    pub release: mpsc::Sender<()>,
}

impl GatedRecognizer {
    pub(crate) fn new(text: &str) -> (Self, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let recognizer = Self {
            text: text.to_string(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(Some(release_rx)),
        };
        let gate = Gate {
            entered: entered_rx,
            release: release_tx,
        };
        (recognizer, gate)
    }
}

impl TextRecognizer for GatedRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<String> {
        let gate = self.release.lock().map_err(|_| anyhow!("poisoned"))?.take();
        if let Some(release) = gate {
            let _ = self.entered.lock().map_err(|_| anyhow!("poisoned"))?.send(());
            let _ = release.recv();
        }
        Ok(self.text.clone())
    }
}

/// Passes writes through until `good_flushes` flushes have happened, then
/// fails every write.
pub(crate) struct FlakyWriter<W: Write> {
    inner: W,
    flushes: usize,
    good_flushes: usize,
}

impl<W: Write> FlakyWriter<W> {
    pub(crate) fn new(inner: W, good_flushes: usize) -> Self {
        Self {
            inner,
            flushes: 0,
            good_flushes,
        }
    }
}

impl<W: Write> Write for FlakyWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.flushes >= self.good_flushes {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        self.inner.flush()
    }
}
