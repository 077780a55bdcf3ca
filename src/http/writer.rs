//! Response writers — the channel handlers write their output through.
//!
//! A [`ResponseWriter`] is owned by the per-request [`Context`](crate::context::Context)
//! and can be decorated by middleware (see
//! [`CaptureWriter`](crate::cache::CaptureWriter)) without the handler noticing.
//! [`ResponseBuffer`] is the live writer installed for every request; the server
//! turns it into a [`Response`] once the handler returns.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::{Headers, Response, StatusCode};

/// Errors returned from [`ResponseWriter::write`] and friends.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("response channel is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes reached the client, but a decorating writer declined to record
    /// them because the response status was not cacheable.
    #[error("response with status {status} was delivered but not cached")]
    Uncacheable { status: StatusCode },
}

/// The capability set a handler uses to produce its response.
///
/// Implementations must be `Send` because the writer lives inside the
/// per-request context, which crosses `.await` points on a multi-threaded runtime.
pub trait ResponseWriter: Send {
    /// Sets the response status code.
    fn write_header(&mut self, status: StatusCode);

    /// Returns the headers written so far.
    fn headers(&self) -> &Headers;

    /// Returns the header map for modification.
    fn headers_mut(&mut self) -> &mut Headers;

    /// Writes body bytes and returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError>;

    /// Writes body text.
    fn write_str(&mut self, data: &str) -> Result<usize, WriteError> {
        self.write(data.as_bytes())
    }

    /// Returns the current status code.
    fn status(&self) -> StatusCode;

    /// Returns `true` once a status or any body bytes have been written.
    fn written(&self) -> bool;

    /// Signals that the handler has finished producing output.
    fn flush(&mut self) -> Result<(), WriteError> {
        Ok(())
    }

    /// Consumes the writer and yields the response to send to the client.
    fn into_response(self: Box<Self>) -> Response;
}

/// In-memory live writer that accumulates the response for the server.
///
/// The status defaults to `200 OK` until [`write_header`](ResponseWriter::write_header)
/// says otherwise.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{ResponseBuffer, ResponseWriter, StatusCode};
///
/// let mut writer = ResponseBuffer::new();
/// writer.headers_mut().insert("Content-Type", "text/plain");
/// writer.write_str("hello").unwrap();
///
/// let response = Box::new(writer).into_response();
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.body_ref(), b"hello");
/// ```
#[derive(Debug)]
pub struct ResponseBuffer {
    status: StatusCode,
    headers: Headers,
    body: BytesMut,
    written: bool,
}

impl ResponseBuffer {
    /// Creates an empty buffer with status `200 OK`.
    pub fn new() -> Self {
        Self {
            status: StatusCode::Ok,
            headers: Headers::new(),
            body: BytesMut::new(),
            written: false,
        }
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter for ResponseBuffer {
    fn write_header(&mut self, status: StatusCode) {
        self.status = status;
        self.written = true;
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        self.body.put_slice(data);
        self.written = true;
        Ok(data.len())
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn written(&self) -> bool {
        self.written
    }

    fn into_response(self: Box<Self>) -> Response {
        let this = *self;
        let mut response = Response::new(this.status).body_bytes(this.body.to_vec());
        for (name, value) in this.headers.iter() {
            response.add_header(name, value);
        }
        response
    }
}
