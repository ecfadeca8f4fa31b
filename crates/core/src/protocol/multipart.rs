//! `multipart/x-mixed-replace` framing for MJPEG over HTTP.
//!
//! Each encoded frame becomes one part; a browser `<img>` replaces the
//! previous image with every part it receives. The bytes of a part are:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <JPEG bytes>\r\n
//! ```
//!
//! Parts carry no `Content-Length`; a reader finds the end of a body at the
//! next `\r\n--frame` delimiter, or at end of stream.

use std::io::{self, Read, Write};

use crate::encoder::EncodedFrame;

/// Boundary token separating parts.
pub const BOUNDARY: &str = "frame";

/// `Content-Type` of the streaming response.
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// `Content-Type` of each part.
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

/// Frame one JPEG buffer as a complete part.
pub fn encode_part(jpeg: &[u8]) -> Vec<u8> {
    let head = format!("--{BOUNDARY}\r\nContent-Type: {PART_CONTENT_TYPE}\r\n\r\n");
    let mut part = Vec::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// Write one frame as a part with a single `write_all`, then flush.
///
/// An error here means the peer is gone.
pub fn write_part<W: Write + ?Sized>(sink: &mut W, frame: &EncodedFrame) -> io::Result<()> {
    sink.write_all(&encode_part(frame.as_bytes()))?;
    sink.flush()
}

/// One part read back from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Part {
    /// Look up a part header by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Incremental reader for a multipart body with a known boundary.
///
/// Accepts a preamble before the first delimiter, parts with or without
/// headers, a closing `--boundary--`, and a stream cut off after a
/// complete part (the usual way an MJPEG stream ends).
pub struct PartReader<R> {
    reader: R,
    buf: Vec<u8>,
    delimiter: Vec<u8>,
    done: bool,
}

impl<R: Read> PartReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_boundary(reader, BOUNDARY)
    }

    pub fn with_boundary(reader: R, boundary: &str) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            delimiter: format!("--{boundary}").into_bytes(),
            done: false,
        }
    }

    /// Read the next part. `Ok(None)` at the end of the body.
    pub fn next_part(&mut self) -> io::Result<Option<Part>> {
        if self.done {
            return Ok(None);
        }

        // Opening delimiter, plus two bytes to tell "\r\n" from "--".
        let after = loop {
            if let Some(pos) = find(&self.buf, &self.delimiter) {
                let end = pos + self.delimiter.len();
                if self.buf.len() >= end + 2 {
                    break end;
                }
            }
            if !self.fill()? {
                return self.finish();
            }
        };
        if &self.buf[after..after + 2] == b"--" {
            return self.finish();
        }
        let line_end = loop {
            if let Some(pos) = find(&self.buf[after..], b"\r\n") {
                break after + pos + 2;
            }
            if !self.fill()? {
                return self.finish();
            }
        };
        self.buf.drain(..line_end);

        let headers = loop {
            if self.buf.starts_with(b"\r\n") {
                self.buf.drain(..2);
                break Vec::new();
            }
            if let Some(pos) = find(&self.buf, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
                self.buf.drain(..pos + 4);
                break parse_headers(&head);
            }
            if !self.fill()? {
                return self.finish();
            }
        };

        let mut closing = b"\r\n".to_vec();
        closing.extend_from_slice(&self.delimiter);
        loop {
            if let Some(pos) = find(&self.buf, &closing) {
                let body = self.buf[..pos].to_vec();
                // Leave "\r\n--boundary" for the next call.
                self.buf.drain(..pos);
                return Ok(Some(Part { headers, body }));
            }
            if !self.fill()? {
                self.done = true;
                if self.buf.ends_with(b"\r\n") {
                    let len = self.buf.len() - 2;
                    let body = self.buf[..len].to_vec();
                    self.buf.clear();
                    return Ok(Some(Part { headers, body }));
                }
                // Cut off mid-body.
                return Ok(None);
            }
        }
    }

    fn fill(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; 8192];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn finish(&mut self) -> io::Result<Option<Part>> {
        self.done = true;
        Ok(None)
    }
}

impl<R: Read> Iterator for PartReader<R> {
    type Item = io::Result<Part>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_part().transpose()
    }
}

fn parse_headers(head: &str) -> Vec<(String, String)> {
    head.split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
