//! GStreamer capture backend.
//!
//! Opens any URI that `uridecodebin` understands (`rtsp://`, `http://`,
//! `file://`, ...) and hands decoded RGB frames to the relay.
//!
//! ## Pipeline
//!
//! ```text
//! uridecodebin uri=<descriptor> ! videoconvert ! video/x-raw,format=RGB
//!     ! appsink name=sink sync=false max-buffers=1 drop=true
//! ```
//!
//! The appsink keeps only the newest decoded frame, so a slow client never
//! makes the pipeline buffer.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use camrelay::{Server, ServerConfig, SourceRouter};
//! use camrelay_gst::GstOpener;
//!
//! let router = SourceRouter::new().with_native(Arc::new(GstOpener::new()?));
//! let mut server = Server::with_opener(ServerConfig::default(), Arc::new(router));
//! server.start()?;
//! # Ok::<(), camrelay::RelayError>(())
//! ```

use std::time::Duration;

use camrelay::{
    Capture, CaptureOpener, CaptureOptions, DecodedImage, RelayError, Result, SourceDescriptor,
};
use gst::prelude::*;

const SINK_NAME: &str = "sink";

fn clock_time(duration: Duration) -> gst::ClockTime {
    let max = gst::ClockTime::MAX.nseconds();
    gst::ClockTime::from_nseconds(duration.as_nanos().min(max as u128) as u64)
}

fn pipeline_description(descriptor: &SourceDescriptor) -> String {
    let uri = descriptor.as_str().replace('"', "%22");
    format!(
        "uridecodebin uri=\"{uri}\" ! videoconvert ! video/x-raw,format=RGB ! \
         appsink name={SINK_NAME} sync=false max-buffers=1 drop=true"
    )
}

/// Opens descriptors through a GStreamer decode pipeline.
#[derive(Debug, Clone, Copy)]
pub struct GstOpener(());

impl GstOpener {
    /// Initialise GStreamer. Safe to call more than once.
    pub fn new() -> Result<Self> {
        gst::init().map_err(|e| RelayError::Backend(format!("gstreamer init failed: {e}")))?;
        tracing::debug!(version = %gst::version_string(), "gstreamer initialised");
        Ok(Self(()))
    }
}

impl CaptureOpener for GstOpener {
    fn open(
        &self,
        descriptor: &SourceDescriptor,
        options: &CaptureOptions,
    ) -> Result<Box<dyn Capture>> {
        let open_error = |reason: String| RelayError::Open {
            descriptor: descriptor.redacted(),
            reason,
        };

        let pipeline = gst::parse::launch(&pipeline_description(descriptor))
            .map_err(|e| open_error(format!("pipeline: {e}")))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| open_error("launch description is not a pipeline".into()))?;

        // From here on `capture` owns the pipeline and tears it down on drop,
        // so every early return below releases the partial open.
        let appsink = pipeline
            .by_name(SINK_NAME)
            .ok_or_else(|| open_error("appsink missing from pipeline".into()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| open_error("appsink element has unexpected type".into()))?;
        let mut capture = GstCapture {
            pipeline,
            appsink,
            read_timeout: options.read_timeout,
            released: false,
        };

        capture
            .pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| open_error(format!("unable to start pipeline: {e}")))?;

        let (result, current, _) = capture.pipeline.state(clock_time(options.open_timeout));
        capture.poll_bus().map_err(open_error)?;
        match result {
            Ok(gst::StateChangeSuccess::Success | gst::StateChangeSuccess::NoPreroll) => {}
            Ok(gst::StateChangeSuccess::Async) => {
                return Err(open_error(format!(
                    "no data within {}ms (state {current:?})",
                    options.open_timeout.as_millis()
                )));
            }
            Err(e) => return Err(open_error(format!("state change failed: {e}"))),
        }

        tracing::debug!(source = %descriptor, "gstreamer pipeline playing");
        Ok(Box::new(capture))
    }
}

/// One running decode pipeline.
pub struct GstCapture {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    read_timeout: Option<Duration>,
    released: bool,
}

impl GstCapture {
    /// Drain pending bus messages. Returns the first error or EOS seen.
    fn poll_bus(&self) -> std::result::Result<(), String> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        while let Some(message) = bus.timed_pop(gst::ClockTime::ZERO) {
            use gst::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    return Err(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => return Err("end of stream".into()),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Capture for GstCapture {
    fn read_frame(&mut self) -> Result<DecodedImage> {
        if self.released {
            return Err(RelayError::Read("capture released".into()));
        }
        self.poll_bus().map_err(RelayError::Read)?;

        let sample = match self.read_timeout {
            Some(timeout) => self
                .appsink
                .try_pull_sample(clock_time(timeout))
                .ok_or(RelayError::Stalled(timeout))?,
            None => self
                .appsink
                .pull_sample()
                .map_err(|_| RelayError::Read("appsink closed (end of stream or error)".into()))?,
        };
        sample_to_image(&sample)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = %e, "unable to stop gstreamer pipeline");
        }
    }
}

impl Drop for GstCapture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Copy an RGB sample into a tightly packed buffer, dropping row padding.
fn sample_to_image(sample: &gst::Sample) -> Result<DecodedImage> {
    let frame_error = |reason: &str| RelayError::Read(format!("bad sample: {reason}"));

    let buffer = sample.buffer().ok_or_else(|| frame_error("missing buffer"))?;
    let caps = sample.caps().ok_or_else(|| frame_error("missing caps"))?;
    let info =
        gst_video::VideoInfo::from_caps(caps).map_err(|_| frame_error("caps are not video"))?;

    let width = info.width();
    let height = info.height();
    let row_bytes = width as usize * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer
        .map_readable()
        .map_err(|_| frame_error("buffer is not readable"))?;
    let data = map.as_slice();

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data.get(..len).ok_or_else(|| frame_error("buffer too short"))?;
        return Ok(DecodedImage::new(width, height, pixels.to_vec()));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .ok_or_else(|| frame_error("row out of bounds"))?,
        );
    }
    Ok(DecodedImage::new(width, height, pixels))
}
