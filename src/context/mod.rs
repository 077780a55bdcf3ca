//! Per-request context: the request, the active response writer, and the abort flag.

use crate::Request;
use crate::http::{ResponseBuffer, ResponseWriter, Response, StatusCode};

/// Per-request context handed to handlers.
///
/// Besides the request itself the context owns the [`ResponseWriter`] handlers
/// write through. Middleware may decorate that writer with
/// [`wrap_writer`](Self::wrap_writer); handlers only ever see
/// `&mut dyn ResponseWriter` and cannot tell the difference.
pub struct Context {
    request: Request,
    writer: Box<dyn ResponseWriter>,
    aborted: bool,
}

impl Context {
    /// Create a new context from a request, writing into a fresh [`ResponseBuffer`].
    pub fn new(request: Request) -> Self {
        Self::with_writer(request, Box::new(ResponseBuffer::new()))
    }

    /// Create a context that writes into the given live writer.
    pub fn with_writer(request: Request, writer: Box<dyn ResponseWriter>) -> Self {
        Self {
            request,
            writer,
            aborted: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the active response writer.
    pub fn writer(&self) -> &dyn ResponseWriter {
        self.writer.as_ref()
    }

    /// Returns the active response writer for writing.
    pub fn writer_mut(&mut self) -> &mut dyn ResponseWriter {
        self.writer.as_mut()
    }

    /// Replaces the active writer with a decoration of it.
    ///
    /// `wrap` receives the current writer by value and returns the writer that
    /// takes its place for the rest of the request.
    pub fn wrap_writer<F>(&mut self, wrap: F)
    where
        F: FnOnce(Box<dyn ResponseWriter>) -> Box<dyn ResponseWriter>,
    {
        let live = std::mem::replace(&mut self.writer, Box::new(ResponseBuffer::new()));
        self.writer = wrap(live);
    }

    /// Marks the request as aborted. Output already written stays written.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Sets the response status and marks the request as aborted.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.writer.write_header(status);
        self.aborted = true;
    }

    /// Returns `true` if a handler aborted this request.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Finalizes the writer into the response sent to the client.
    pub fn into_response(self) -> Response {
        self.writer.into_response()
    }
}
