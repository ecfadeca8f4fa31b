//! Error types for the relay library.

use std::fmt;
use std::time::Duration;

/// Errors that can occur while relaying a camera feed.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Source**: [`Open`](Self::Open), [`Read`](Self::Read) and
///   [`Stalled`](Self::Stalled) are recovered by the
///   [`ReconnectSupervisor`](crate::supervisor::ReconnectSupervisor).
/// - **Frame**: on [`Encode`](Self::Encode) or [`InvalidImage`](Self::InvalidImage)
///   the frame is dropped and the stream continues.
/// - **Sink**: [`Io`](Self::Io) means the client went away; ends that session only.
/// - **HTTP**: [`Parse`](Self::Parse) is a malformed request head.
/// - **Lifecycle**: [`Cancelled`](Self::Cancelled), [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning), [`Backend`](Self::Backend).
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single attempt to connect to the upstream source failed.
    #[error("cannot open {descriptor}: {reason}")]
    Open { descriptor: String, reason: String },

    /// The upstream disconnected, hit end of stream, or failed to decode.
    #[error("frame read failed: {0}")]
    Read(String),

    /// No frame arrived within the configured read timeout.
    #[error("no frame within {0:?}")]
    Stalled(Duration),

    /// The JPEG encoder rejected a frame.
    #[error("JPEG encode failed: {0}")]
    Encode(#[from] image::ImageError),

    /// A decoded frame whose buffer does not match its dimensions.
    #[error("invalid image: {width}x{height} with {len} bytes")]
    InvalidImage { width: u32, height: u32, len: usize },

    /// Failed to parse an HTTP request head.
    #[error("HTTP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// The stop signal fired while waiting on the source.
    #[error("cancelled")]
    Cancelled,

    /// [`Server::start`](crate::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// The capture backend itself could not be initialised.
    #[error("capture backend error: {0}")]
    Backend(String),
}

impl RelayError {
    /// Whether the supervisor should release the handle and reconnect.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::Read(_) | Self::Stalled(_) | Self::Backend(_)
        )
    }

    /// Whether the error is confined to a single frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::InvalidImage { .. })
    }
}

/// Specific kind of HTTP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method Target Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// The request head exceeded the size limit.
    HeadTooLarge,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::HeadTooLarge => write!(f, "request head too large"),
        }
    }
}

/// Convenience alias for `Result<T, RelayError>`.
pub type Result<T> = std::result::Result<T, RelayError>;
