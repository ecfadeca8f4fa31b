use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::encoder::DEFAULT_JPEG_QUALITY;
use crate::endpoint::StreamEndpoint;
use crate::error::{RelayError, Result};
use crate::protocol::RequestHandler;
use crate::session::{PumpState, SessionManager};
use crate::signal::StopSignal;
use crate::source::{CaptureOpener, CaptureOptions, SourceDescriptor, SourceRouter};
use crate::supervisor::DEFAULT_RETRY_DELAY;
use crate::transport::tcp;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_SOURCE: &str = "rtsp://192.168.1.164:554/stream1";
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-wide configuration, read once at startup and immutable after.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (`host:port`). Port 0 picks an ephemeral port.
    pub bind_addr: String,
    /// Source used when a request has no `src` override.
    pub default_source: SourceDescriptor,
    /// Fixed wait between open attempts and after a read failure.
    pub retry_delay: Duration,
    /// JPEG quality, 0–100 (clamped to 1–100 by the encoder).
    pub jpeg_quality: u8,
    /// Optional bound on a single frame read. `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
    /// Bound on a single backend handshake.
    pub open_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            default_source: SourceDescriptor::new(DEFAULT_SOURCE),
            retry_delay: DEFAULT_RETRY_DELAY,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            read_timeout: None,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Per-attempt options handed to the capture backend.
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            read_timeout: self.read_timeout,
            open_timeout: self.open_timeout,
        }
    }
}

/// High-level relay server.
///
/// Owns the listener thread, the session registry and the stop signal.
/// Delegates connection handling to [`tcp`] and streaming to
/// [`StreamEndpoint`].
pub struct Server {
    config: Arc<ServerConfig>,
    opener: Arc<dyn CaptureOpener>,
    session_manager: SessionManager,
    running: Arc<AtomicBool>,
    stop: StopSignal,
    local_addr: Option<SocketAddr>,
    accept_thread: Option<JoinHandle<()>>,
}

impl Server {
    /// Server with only the built-in `test://` source available.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_opener(config, Arc::new(SourceRouter::new()))
    }

    /// Server that opens sources through `opener`.
    pub fn with_opener(config: ServerConfig, opener: Arc<dyn CaptureOpener>) -> Self {
        Self {
            config: Arc::new(config),
            opener,
            session_manager: SessionManager::new(),
            running: Arc::new(AtomicBool::new(false)),
            stop: StopSignal::new(),
            local_addr: None,
            accept_thread: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RelayError::AlreadyRunning);
        }
        if self.stop.is_triggered() {
            self.stop = StopSignal::new();
        }

        let listener = TcpListener::bind(&self.config.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let handler = Arc::new(RequestHandler::new(self.config.clone()));
        let endpoint = StreamEndpoint::new(
            self.config.clone(),
            self.opener.clone(),
            self.session_manager.clone(),
            self.stop.clone(),
        );

        tracing::info!(
            addr = %local_addr,
            default_source = %self.config.default_source,
            quality = self.config.jpeg_quality,
            retry_delay_ms = self.config.retry_delay.as_millis() as u64,
            "relay server listening"
        );

        let accept = thread::Builder::new()
            .name("camrelay-accept".into())
            .spawn(move || tcp::accept_loop(listener, handler, endpoint, running))?;
        self.accept_thread = Some(accept);

        Ok(())
    }

    /// Stop accepting, and tell every session to wind down.
    ///
    /// Sessions blocked inside a backend read end when that read returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop.trigger();
        if let Some(accept) = self.accept_thread.take() {
            let _ = accept.join();
        }
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.local_addr.ok_or(RelayError::NotStarted)
    }

    pub fn viewers(&self) -> Vec<Viewer> {
        self.session_manager
            .sessions()
            .iter()
            .map(|session| Viewer {
                session_id: session.id.clone(),
                client_addr: session.peer_addr,
                source: session.source.clone(),
                state: session.state(),
            })
            .collect()
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.session_manager
    }

    /// Returns the server's configuration.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// Information about a connected viewer.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub session_id: String,
    pub client_addr: Option<SocketAddr>,
    /// Redacted source descriptor.
    pub source: String,
    pub state: PumpState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
        assert_eq!(config.default_source.as_str(), DEFAULT_SOURCE);
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.jpeg_quality, 80);
        assert!(config.read_timeout.is_none());
    }

    #[test]
    fn capture_options_follow_config() {
        let config = ServerConfig {
            read_timeout: Some(Duration::from_secs(3)),
            open_timeout: Duration::from_secs(4),
            ..ServerConfig::default()
        };
        let options = config.capture_options();
        assert_eq!(options.read_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.open_timeout, Duration::from_secs(4));
    }

    #[test]
    fn start_twice_fails_and_stop_allows_restart() {
        let mut server = Server::new(ServerConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..ServerConfig::default()
        });
        assert!(matches!(server.local_addr(), Err(RelayError::NotStarted)));
        server.start().unwrap();
        assert!(server.is_running());
        assert!(matches!(server.start(), Err(RelayError::AlreadyRunning)));
        server.stop();
        assert!(!server.is_running());
        server.start().unwrap();
        assert!(server.is_running());
        server.stop();
    }
}
