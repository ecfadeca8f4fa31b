use clap::Parser;
use camrelay::{Server, ServerConfig, SourceDescriptor, SourceRouter};
use std::process::ExitCode;
use std::sync::{Arc, mpsc};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "camrelay",
    version,
    about = "Relay an RTSP camera to browsers as an MJPEG stream"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, short, env = "CAMRELAY_BIND", default_value = camrelay::server::DEFAULT_BIND_ADDR)]
    bind: String,

    /// Source used when a request has no `src` parameter
    #[arg(long, short, env = "CAMRELAY_SOURCE", default_value = camrelay::server::DEFAULT_SOURCE)]
    source: String,

    /// Wait between reconnect attempts, in milliseconds
    #[arg(long, env = "CAMRELAY_RETRY_DELAY_MS", default_value_t = 2000)]
    retry_delay_ms: u64,

    /// JPEG quality (1-100)
    #[arg(
        long,
        short,
        env = "CAMRELAY_QUALITY",
        default_value_t = camrelay::encoder::DEFAULT_JPEG_QUALITY
    )]
    quality: u8,

    /// Give up on a frame read after this many milliseconds (0 waits forever)
    #[arg(long, env = "CAMRELAY_READ_TIMEOUT_MS", default_value_t = 0)]
    read_timeout_ms: u64,

    /// Give up on a connection attempt after this many milliseconds
    #[arg(long, env = "CAMRELAY_OPEN_TIMEOUT_MS", default_value_t = 10_000)]
    open_timeout_ms: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind,
            default_source: SourceDescriptor::new(self.source),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            jpeg_quality: self.quality,
            read_timeout: (self.read_timeout_ms > 0)
                .then(|| Duration::from_millis(self.read_timeout_ms)),
            open_timeout: Duration::from_millis(self.open_timeout_ms),
        }
    }
}

#[cfg(feature = "gstreamer")]
fn router() -> Result<SourceRouter, camrelay::RelayError> {
    let opener = camrelay_gst::GstOpener::new()?;
    Ok(SourceRouter::new().with_native(Arc::new(opener)))
}

#[cfg(not(feature = "gstreamer"))]
fn router() -> Result<SourceRouter, camrelay::RelayError> {
    tracing::warn!("built without gstreamer: only test:// sources are available");
    Ok(SourceRouter::new())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();

    let router = match router() {
        Ok(router) => router,
        Err(e) => {
            tracing::error!(error = %e, "capture backend unavailable");
            return ExitCode::FAILURE;
        }
    };

    let mut server = Server::with_opener(config, Arc::new(router));
    if let Err(e) = server.start() {
        tracing::error!(error = %e, "failed to start server");
        return ExitCode::FAILURE;
    }

    let (tx, rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        tracing::error!(error = %e, "unable to install signal handler");
        server.stop();
        return ExitCode::FAILURE;
    }

    if let Ok(addr) = server.local_addr() {
        tracing::info!("open http://{addr}/ in a browser; ctrl-c to stop");
    }
    let _ = rx.recv();

    server.stop();
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_config() {
        let config = Args::parse_from(["camrelay"]).into_config();
        let defaults = ServerConfig::default();
        assert_eq!(config.bind_addr, defaults.bind_addr);
        assert_eq!(config.default_source, defaults.default_source);
        assert_eq!(config.retry_delay, defaults.retry_delay);
        assert_eq!(config.jpeg_quality, defaults.jpeg_quality);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.open_timeout, defaults.open_timeout);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Args::parse_from([
            "camrelay",
            "--bind",
            "0.0.0.0:8080",
            "--source",
            "test://bars",
            "--quality",
            "55",
            "--read-timeout-ms",
            "1500",
        ])
        .into_config();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.default_source.as_str(), "test://bars");
        assert_eq!(config.jpeg_quality, 55);
        assert_eq!(config.read_timeout, Some(Duration::from_millis(1500)));
    }
}
