//! Built-in test pattern source for `test://` descriptors.
//!
//! Produces moving colour bars without any camera or codec library, so the
//! relay can be demonstrated and tested end to end. Query parameters:
//!
//! | Parameter | Default | Meaning |
//! |-----------|---------|---------|
//! | `width`, `height` | 320, 240 | frame size, each capped at 4096 |
//! | `fps` | 15 | pacing; `0` delivers frames as fast as they are read |
//! | `fail_after` | none | every opened capture fails its read after N frames |
//! | `stall_after` | none | reads block after N frames (honours the read timeout) |
//! | `refuse` | false | every open attempt fails |

use std::thread;
use std::time::{Duration, Instant};

use url::Url;

use super::{Capture, CaptureOpener, CaptureOptions, DecodedImage, SourceDescriptor};
use crate::error::{RelayError, Result};

const BARS: [[u8; 3]; 7] = [
    [192, 192, 192],
    [192, 192, 0],
    [0, 192, 192],
    [0, 192, 0],
    [192, 0, 192],
    [192, 0, 0],
    [0, 0, 192],
];

/// Largest width or height a `test://` descriptor may ask for.
pub const MAX_DIMENSION: u32 = 4096;

/// Parsed `test://` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub fail_after: Option<u64>,
    pub stall_after: Option<u64>,
    pub refuse: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 15,
            fail_after: None,
            stall_after: None,
            refuse: false,
        }
    }
}

impl SyntheticConfig {
    /// Read parameters from the descriptor's query string. Unknown or
    /// unparsable parameters keep their defaults.
    pub fn from_descriptor(descriptor: &SourceDescriptor) -> Self {
        let mut config = Self::default();
        let Ok(url) = Url::parse(descriptor.as_str()) else {
            return config;
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "width" => config.width = dimension(&value, config.width),
                "height" => config.height = dimension(&value, config.height),
                "fps" => config.fps = value.parse().unwrap_or(config.fps),
                "fail_after" => config.fail_after = value.parse().ok(),
                "stall_after" => config.stall_after = value.parse().ok(),
                "refuse" => config.refuse = matches!(value.as_ref(), "1" | "true" | "yes"),
                _ => {}
            }
        }
        config
    }
}

fn dimension(raw: &str, fallback: u32) -> u32 {
    raw.parse().unwrap_or(fallback).clamp(1, MAX_DIMENSION)
}

/// Opener for `test://` descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticOpener;

impl SyntheticOpener {
    pub const SCHEME: &'static str = "test";
}

impl CaptureOpener for SyntheticOpener {
    fn open(
        &self,
        descriptor: &SourceDescriptor,
        options: &CaptureOptions,
    ) -> Result<Box<dyn Capture>> {
        let config = SyntheticConfig::from_descriptor(descriptor);
        if config.refuse {
            return Err(RelayError::Open {
                descriptor: descriptor.redacted(),
                reason: "connection refused (synthetic)".into(),
            });
        }
        tracing::info!(
            source = %descriptor,
            width = config.width,
            height = config.height,
            fps = config.fps,
            "synthetic source opened"
        );
        Ok(Box::new(SyntheticCapture::new(config, options.read_timeout)))
    }
}

/// One synthetic connection. Frame counters start at zero on every open.
pub struct SyntheticCapture {
    config: SyntheticConfig,
    read_timeout: Option<Duration>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    released: bool,
}

impl SyntheticCapture {
    /// Dimensions outside `1..=MAX_DIMENSION` are clamped.
    pub fn new(mut config: SyntheticConfig, read_timeout: Option<Duration>) -> Self {
        config.width = config.width.clamp(1, MAX_DIMENSION);
        config.height = config.height.clamp(1, MAX_DIMENSION);
        Self {
            config,
            read_timeout,
            frame_count: 0,
            last_frame_at: None,
            released: false,
        }
    }

    fn pace(&mut self) {
        if self.config.fps == 0 {
            return;
        }
        let interval = Duration::from_secs(1) / self.config.fps;
        if let Some(last) = self.last_frame_at {
            let due = last + interval;
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    fn render(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let shift = self.frame_count as usize;
        let mut pixels = Vec::with_capacity(width * height * 3);
        for _ in 0..height {
            for x in 0..width {
                let bar = ((x + shift) * BARS.len() / width) % BARS.len();
                pixels.extend_from_slice(&BARS[bar]);
            }
        }
        pixels
    }
}

impl Capture for SyntheticCapture {
    fn read_frame(&mut self) -> Result<DecodedImage> {
        if self.released {
            return Err(RelayError::Read("capture released".into()));
        }
        if self.config.fail_after == Some(self.frame_count) {
            return Err(RelayError::Read(format!(
                "simulated disconnect after {} frames",
                self.frame_count
            )));
        }
        if self.config.stall_after == Some(self.frame_count) {
            match self.read_timeout {
                Some(timeout) => {
                    thread::sleep(timeout);
                    return Err(RelayError::Stalled(timeout));
                }
                None => loop {
                    thread::sleep(Duration::from_secs(3600));
                },
            }
        }

        self.pace();
        let pixels = self.render();
        self.frame_count += 1;
        Ok(DecodedImage::new(
            self.config.width,
            self.config.height,
            pixels,
        ))
    }

    fn release(&mut self) {
        self.released = true;
    }
}
