//! Relay a camera's live video to HTTP clients as an MJPEG stream.
//!
//! Each client that requests `/video_feed` gets its own upstream
//! connection, a JPEG encoder and a
//! `multipart/x-mixed-replace` response that stays open until the client
//! leaves or the server stops. Upstream failures are retried forever with
//! a fixed delay; the client just sees the picture freeze and resume.

pub mod encoder;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod signal;
pub mod source;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod testing;

pub use encoder::{EncodedFrame, FrameEncoder};
pub use endpoint::StreamEndpoint;
pub use error::{RelayError, Result};
pub use server::{Server, ServerConfig, Viewer};
pub use session::PumpState;
pub use signal::StopSignal;
pub use source::{
    Capture, CaptureOpener, CaptureOptions, DecodedImage, SourceDescriptor, SourceHandle,
    SourceRouter,
};
pub use supervisor::ReconnectSupervisor;
