/// A bounded HTTP/1.1 response, or the head of a streaming one.
///
/// Uses a builder pattern: chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then call [`serialize`](Self::serialize).
/// `Content-Length` is computed automatically when a body is present.
/// Every response closes the connection.
#[must_use]
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Value of the `Server` header on every response.
pub const SERVER_AGENT: &str = concat!("camrelay/", env!("CARGO_PKG_VERSION"));

impl HttpResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        HttpResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: vec![
                ("Server".to_string(), SERVER_AGENT.to_string()),
                ("Connection".to_string(), "close".to_string()),
            ],
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    pub fn not_found() -> Self {
        Self::new(404, "Not Found").with_text("not found\n")
    }

    pub fn bad_request() -> Self {
        Self::new(400, "Bad Request").with_text("bad request\n")
    }

    pub fn method_not_allowed() -> Self {
        Self::new(405, "Method Not Allowed")
            .add_header("Allow", "GET")
            .with_text("method not allowed\n")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn with_text(self, text: &str) -> Self {
        self.add_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(text)
    }

    /// Serialize to wire bytes.
    ///
    /// Without a body this is just the head, which is how a streaming
    /// response starts: the caller keeps writing to the socket afterwards.
    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text);
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }

        let mut out = Vec::new();
        if let Some(body) = &self.body {
            head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
            out.extend_from_slice(head.as_bytes());
            out.extend_from_slice(body);
        } else {
            head.push_str("\r\n");
            out.extend_from_slice(head.as_bytes());
        }
        out
    }
}
