//! The stream endpoint: binds one client sink to a fresh session.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::encoder::FrameEncoder;
use crate::error::Result;
use crate::protocol::RequestHandler;
use crate::server::ServerConfig;
use crate::session::{PumpReport, SessionManager, StreamPump};
use crate::signal::StopSignal;
use crate::source::{CaptureOpener, SourceDescriptor};
use crate::supervisor::ReconnectSupervisor;

/// Starts a [`StreamPump`] per request and holds the response open for as
/// long as it runs.
///
/// Every call builds its own supervisor, encoder and upstream connection;
/// the only things shared between sessions are the read-only config, the
/// opener, the session registry and the stop signal.
#[derive(Clone)]
pub struct StreamEndpoint {
    config: Arc<ServerConfig>,
    opener: Arc<dyn CaptureOpener>,
    sessions: SessionManager,
    stop: StopSignal,
}

impl StreamEndpoint {
    pub fn new(
        config: Arc<ServerConfig>,
        opener: Arc<dyn CaptureOpener>,
        sessions: SessionManager,
        stop: StopSignal,
    ) -> Self {
        Self {
            config,
            opener,
            sessions,
            stop,
        }
    }

    /// Write the streaming response head, then pump frames into `sink`
    /// until the client goes away or the server stops.
    ///
    /// Returns an error only if the response head cannot be written.
    pub fn serve<W: Write + ?Sized>(
        &self,
        descriptor: SourceDescriptor,
        peer_addr: Option<SocketAddr>,
        sink: &mut W,
    ) -> Result<PumpReport> {
        sink.write_all(&RequestHandler::stream_head().serialize())?;
        sink.flush()?;

        let session = self.sessions.create_session(peer_addr, &descriptor);
        let _registration = Registration {
            sessions: &self.sessions,
            id: &session.id,
        };
        tracing::info!(
            session_id = %session.id,
            peer = ?peer_addr,
            source = %session.source,
            "stream session started"
        );

        let supervisor = ReconnectSupervisor::new(
            self.opener.clone(),
            self.config.capture_options(),
            self.config.retry_delay,
            self.stop.clone(),
        );
        let pump = StreamPump::new(
            session.clone(),
            descriptor,
            supervisor,
            FrameEncoder::new(self.config.jpeg_quality),
            self.stop.clone(),
        );

        Ok(pump.run(sink))
    }
}

/// Unregisters a session when dropped, including while unwinding.
struct Registration<'a> {
    sessions: &'a SessionManager,
    id: &'a str,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.sessions.remove_session(self.id);
    }
}
