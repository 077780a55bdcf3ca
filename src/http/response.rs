//! Finished HTTP/1.1 responses and their wire encoding.

use std::fmt::Write as _;

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// A response ready to be written to the socket.
///
/// Handlers either build one directly or let the context's
/// [`ResponseWriter`](super::ResponseWriter) produce it.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Response, StatusCode};
///
/// let wire = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#)
///     .into_bytes();
///
/// assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Appends a header without consuming the response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    #[must_use]
    pub fn body(self, body: impl Into<String>) -> Self {
        self.body_bytes(body.into())
    }

    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Chooses between `Connection: keep-alive` (the default) and `Connection: close`.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers added by the handler; `Connection` and `Content-Length` are only
    /// written by [`into_bytes`](Self::into_bytes).
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Encodes the status line, headers, and body.
    ///
    /// A non-empty body without a `Content-Type` is labelled as UTF-8 text.
    pub fn into_bytes(self) -> BytesMut {
        let mut head = format!("HTTP/1.1 {}\r\n", self.status);
        for (name, value) in self.headers.iter() {
            let _ = write!(head, "{name}: {value}\r\n");
        }
        if !self.body.is_empty() && !self.headers.contains("content-type") {
            head.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        }
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        let _ = write!(
            head,
            "Connection: {connection}\r\nContent-Length: {}\r\n\r\n",
            self.body.len()
        );

        let mut wire = BytesMut::with_capacity(head.len() + self.body.len());
        wire.put_slice(head.as_bytes());
        wire.put_slice(&self.body);
        wire
    }
}
