use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::endpoint::StreamEndpoint;
use crate::protocol::{HttpRequest, HttpResponse, RequestHandler, Route};

/// How long a client may take to send its request head.
const HEAD_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
pub fn accept_loop(
    listener: TcpListener,
    handler: Arc<RequestHandler>,
    endpoint: StreamEndpoint,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let h = handler.clone();
                let e = endpoint.clone();
                let spawned = thread::Builder::new()
                    .name("camrelay-conn".into())
                    .spawn(move || Connection::handle(stream, &h, &e));
                if let Err(e) = spawned {
                    tracing::warn!(error = %e, "unable to spawn connection thread");
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single HTTP client connection: one request, one response.
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Entry point: read the request, answer it, close.
    pub fn handle(stream: TcpStream, handler: &RequestHandler, endpoint: &StreamEndpoint) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };

        tracing::debug!(%peer_addr, "client connected");

        let _ = stream.set_nodelay(true);
        if stream.set_read_timeout(Some(HEAD_READ_TIMEOUT)).is_err() {
            return;
        }
        let reader_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        let mut conn = Connection {
            reader: BufReader::new(reader_stream),
            writer: stream,
            peer_addr,
        };

        let reason = conn.run(handler, endpoint);
        tracing::debug!(%peer_addr, reason, "client disconnected");
    }

    /// Returns the reason the connection ended.
    fn run(&mut self, handler: &RequestHandler, endpoint: &StreamEndpoint) -> &'static str {
        let head = match HttpRequest::read_head(&mut self.reader) {
            Ok(Some(head)) => head,
            Ok(None) => return "connection closed by client",
            Err(e) => {
                tracing::warn!(peer = %self.peer_addr, error = %e, "unable to read request");
                return self.reply(HttpResponse::bad_request());
            }
        };

        let request = match HttpRequest::parse(&head) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                return self.reply(HttpResponse::bad_request());
            }
        };

        tracing::debug!(
            peer = %self.peer_addr,
            method = %request.method,
            target = %request.target,
            "request"
        );

        match handler.route(&request) {
            Route::Respond(response) => self.reply(response),
            Route::Stream(descriptor) => {
                match endpoint.serve(descriptor, Some(self.peer_addr), &mut self.writer) {
                    Ok(report) => report.reason,
                    Err(_) => "write error",
                }
            }
        }
    }

    fn reply(&mut self, response: HttpResponse) -> &'static str {
        tracing::debug!(peer = %self.peer_addr, status = response.status_code, "response");
        match self.writer.write_all(&response.serialize()) {
            Ok(()) => "response sent",
            Err(_) => "write error",
        }
    }
}
