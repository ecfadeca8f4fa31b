use std::io::{BufRead, Read};

use url::form_urlencoded;

use crate::error::{ParseErrorKind, RelayError};

/// Largest request head the server will buffer.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

/// A parsed HTTP/1.x request head.
///
/// ```text
/// Method SP Request-Target SP HTTP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// ```
///
/// Header lookup is case-insensitive. Request bodies are never read; the
/// relay only serves `GET`.
#[derive(Debug)]
pub struct HttpRequest {
    /// Request method (`GET`, `HEAD`, ...).
    pub method: String,
    /// Origin-form target, e.g. `/video_feed?src=...`.
    pub target: String,
    /// Protocol version (`HTTP/1.1` or `HTTP/1.0`).
    pub version: String,
    /// Headers as ordered (name, value) pairs, names as received.
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Parse a request head (request line, headers, trailing blank line).
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or(RelayError::Parse {
                kind: ParseErrorKind::EmptyRequest,
            })?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 || !parts[2].starts_with("HTTP/") {
            return Err(RelayError::Parse {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        }

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or(RelayError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Ok(HttpRequest {
            method: parts[0].to_string(),
            target: parts[1].to_string(),
            version: parts[2].to_string(),
            headers,
        })
    }

    /// Read one request head, through the blank line, from `reader`.
    ///
    /// Leading blank lines are skipped. Returns `Ok(None)` if the peer
    /// closes before a complete head arrives, and
    /// [`ParseErrorKind::HeadTooLarge`] past [`MAX_HEAD_BYTES`].
    pub fn read_head<R: BufRead>(reader: &mut R) -> crate::error::Result<Option<String>> {
        let mut head = String::new();
        loop {
            let mut line = String::new();
            let budget = (MAX_HEAD_BYTES + 1 - head.len()) as u64;
            if reader.by_ref().take(budget).read_line(&mut line)? == 0 {
                return Ok(None);
            }
            head.push_str(&line);
            if head.len() > MAX_HEAD_BYTES {
                return Err(RelayError::Parse {
                    kind: ParseErrorKind::HeadTooLarge,
                });
            }
            if line == "\r\n" || line == "\n" {
                if head.trim().is_empty() {
                    head.clear();
                    continue;
                }
                return Ok(Some(head));
            }
        }
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Target path without the query string.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// Raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// First value of a form-encoded query parameter, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stream_request() {
        let raw = "GET /video_feed HTTP/1.1\r\nHost: localhost:5000\r\n\r\n";
        let req = HttpRequest::parse(raw).unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path(), "/video_feed");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.get_header("host"), Some("localhost:5000"));
        assert_eq!(req.query_param("src"), None);
    }

    #[test]
    fn decodes_source_parameter() {
        let raw = "GET /video_feed?src=rtsp%3A%2F%2Fadmin%3Ap%40ss%4010.0.0.5%3A554%2Fstream1 HTTP/1.1\r\n\r\n";
        let req = HttpRequest::parse(raw).unwrap();
        assert_eq!(req.path(), "/video_feed");
        assert_eq!(
            req.query_param("src").as_deref(),
            Some("rtsp://admin:p@ss@10.0.0.5:554/stream1")
        );
    }

    #[test]
    fn plus_decodes_to_space() {
        let req = HttpRequest::parse("GET /?src=a+b&x=1 HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.query_param("src").as_deref(), Some("a b"));
        assert_eq!(req.query_param("x").as_deref(), Some("1"));
    }

    #[test]
    fn reads_head_up_to_blank_line() {
        let mut input = std::io::Cursor::new(
            b"\r\nGET / HTTP/1.1\r\nHost: x\r\n\r\nleftover".to_vec(),
        );
        let head = HttpRequest::read_head(&mut input).unwrap().unwrap();
        assert_eq!(head, "GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    }

    #[test]
    fn incomplete_head_reads_as_none() {
        let mut input = std::io::Cursor::new(b"GET / HTTP/1.1\r\nHost: x\r\n".to_vec());
        assert!(HttpRequest::read_head(&mut input).unwrap().is_none());
    }

    #[test]
    fn oversized_head_is_rejected() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Junk: ".to_vec();
        raw.extend(std::iter::repeat_n(b'a', MAX_HEAD_BYTES));
        raw.extend_from_slice(b"\r\n\r\n");
        let err = HttpRequest::read_head(&mut std::io::Cursor::new(raw)).unwrap_err();
        assert!(matches!(
            err,
            RelayError::Parse {
                kind: ParseErrorKind::HeadTooLarge
            }
        ));
    }

    #[test]
    fn parse_empty_request() {
        assert!(HttpRequest::parse("").is_err());
        assert!(HttpRequest::parse("\r\n").is_err());
    }

    #[test]
    fn parse_invalid_request_line() {
        assert!(HttpRequest::parse("GET /\r\n\r\n").is_err());
        assert!(HttpRequest::parse("GET / RTSP/1.0\r\n\r\n").is_err());
    }

    #[test]
    fn parse_invalid_header() {
        let err = HttpRequest::parse("GET / HTTP/1.1\r\nno colon here\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RelayError::Parse {
                kind: ParseErrorKind::InvalidHeader
            }
        ));
    }
}
