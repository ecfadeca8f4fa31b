//! HTTP/1.1 shell and the multipart wire format.
//!
//! The relay speaks just enough HTTP to serve a long-lived streaming
//! response: it parses a request head, routes `GET` requests, and writes
//! either a small bounded response or an unbounded
//! `multipart/x-mixed-replace` body.
//!
//! ```text
//! GET /video_feed?src=rtsp%3A%2F%2F10.0.0.5%2Fstream1 HTTP/1.1\r\n
//! Host: relay:5000\r\n
//! \r\n
//! ```
//!
//! ## Routes
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/video_feed` | MJPEG stream (query `src` overrides the default source) |
//! | GET | `/` | viewer page |
//! | other | any | 405 Method Not Allowed |
//! | GET | other | 404 Not Found |

pub mod handler;
pub mod multipart;
pub mod page;
pub mod request;
pub mod response;

pub use handler::{RequestHandler, Route};
pub use request::HttpRequest;
pub use response::HttpResponse;
