//! Scripted sources and sinks for unit tests.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{RelayError, Result};
use crate::source::{Capture, CaptureOpener, CaptureOptions, DecodedImage, SourceDescriptor};

/// Call counts shared between a test and the captures it hands out.
#[derive(Default)]
pub(crate) struct Counters {
    opens: AtomicUsize,
    open_failures: AtomicUsize,
    reads: AtomicUsize,
    releases: AtomicUsize,
    frames: AtomicUsize,
}

impl Counters {
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
    pub(crate) fn open_failures(&self) -> usize {
        self.open_failures.load(Ordering::SeqCst)
    }
    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
    pub(crate) fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

/// Outcome of one scripted `read_frame` call.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Frame,
    /// A frame whose buffer does not match its size; the encoder rejects it.
    Bad,
    Fail,
    /// The read panics, like a backend bug.
    Panic,
}

/// Distinct 4x4 image for frame number `seq`.
pub(crate) fn frame_image(seq: usize) -> DecodedImage {
    let shade = [(seq * 37 % 256) as u8, (seq * 91 % 256) as u8, (seq * 13 % 256) as u8];
    DecodedImage::new(4, 4, shade.repeat(16))
}

/// Capture that plays back `steps`, then yields good frames forever.
pub(crate) struct ScriptedCapture {
    steps: VecDeque<Step>,
    counters: Arc<Counters>,
    released: bool,
}

impl ScriptedCapture {
    pub(crate) fn endless(counters: Arc<Counters>) -> Self {
        Self::scripted(counters, Vec::new())
    }

    pub(crate) fn scripted(counters: Arc<Counters>, steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            counters,
            released: false,
        }
    }
}

impl Capture for ScriptedCapture {
    fn read_frame(&mut self) -> Result<DecodedImage> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front().unwrap_or(Step::Frame) {
            Step::Frame => {
                let seq = self.counters.frames.fetch_add(1, Ordering::SeqCst);
                Ok(frame_image(seq))
            }
            Step::Bad => Ok(DecodedImage::new(4, 4, Vec::new())),
            Step::Fail => Err(RelayError::Read("scripted read failure".into())),
            Step::Panic => panic!("scripted read panic"),
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Opener that follows a plan: `None` fails the attempt, `Some(steps)`
/// opens a [`ScriptedCapture`]. Once the plan runs out every attempt opens
/// an endless capture, unless `refuse_forever` is set.
pub(crate) struct ScriptedOpener {
    plan: Mutex<VecDeque<Option<Vec<Step>>>>,
    counters: Arc<Counters>,
    refuse_forever: bool,
}

impl ScriptedOpener {
    pub(crate) fn new(counters: Arc<Counters>) -> Self {
        Self::with_plan(counters, Vec::new())
    }

    pub(crate) fn with_plan(counters: Arc<Counters>, plan: Vec<Option<Vec<Step>>>) -> Self {
        Self {
            plan: Mutex::new(plan.into()),
            counters,
            refuse_forever: false,
        }
    }

    pub(crate) fn unreachable(counters: Arc<Counters>) -> Self {
        Self {
            refuse_forever: true,
            ..Self::new(counters)
        }
    }
}

impl CaptureOpener for ScriptedOpener {
    fn open(
        &self,
        descriptor: &SourceDescriptor,
        _options: &CaptureOptions,
    ) -> Result<Box<dyn Capture>> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let next = if self.refuse_forever {
            Some(None)
        } else {
            self.plan.lock().pop_front()
        };
        match next {
            Some(None) => {
                self.counters.open_failures.fetch_add(1, Ordering::SeqCst);
                Err(RelayError::Open {
                    descriptor: descriptor.redacted(),
                    reason: "scripted open failure".into(),
                })
            }
            Some(Some(steps)) => Ok(Box::new(ScriptedCapture::scripted(
                self.counters.clone(),
                steps,
            ))),
            None => Ok(Box::new(ScriptedCapture::endless(self.counters.clone()))),
        }
    }
}

/// Sink that accepts `accept` writes and then behaves like a closed socket.
pub(crate) struct ClosingSink {
    pub(crate) bytes: Vec<u8>,
    pub(crate) writes: usize,
    accept: usize,
}

impl ClosingSink {
    pub(crate) fn accepting(accept: usize) -> Self {
        Self {
            bytes: Vec::new(),
            writes: 0,
            accept,
        }
    }
}

impl Write for ClosingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes >= self.accept {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.writes += 1;
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
