//! Response capture — a writer decorator that records cacheable output.

use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tracing::{debug, warn};

use super::{CacheKey, Snapshot, Store};
use crate::http::{Headers, Response, ResponseWriter, StatusCode, WriteError};

/// When the captured output is committed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Every successful write made under `200 OK` replaces the stored snapshot
    /// with the bytes of that write alone. Handlers that write their body in one
    /// call get an exact copy; multi-write responses keep only the last chunk.
    #[default]
    PerWrite,
    /// Every delivered write is buffered, whatever the status at the time, and a
    /// single snapshot of the whole body is committed on
    /// [`flush`](ResponseWriter::flush) if the status is `200 OK` by then. A
    /// failed live write anywhere in the response means nothing is committed.
    WholeResponse,
}

/// Stands in for the live writer while a cacheable endpoint runs.
///
/// Every call is forwarded to the live writer first, so the client receives
/// exactly what it would without caching. Recording happens afterwards and
/// never alters what was delivered.
pub struct CaptureWriter {
    inner: Box<dyn ResponseWriter>,
    store: Arc<dyn Store>,
    key: CacheKey,
    ttl: Duration,
    mode: CaptureMode,
    // Only used in `WholeResponse` mode.
    buffered: BytesMut,
    // Set by any failed live write; the client did not get the whole body.
    poisoned: bool,
}

impl CaptureWriter {
    pub fn new(
        inner: Box<dyn ResponseWriter>,
        store: Arc<dyn Store>,
        key: CacheKey,
        ttl: Duration,
        mode: CaptureMode,
    ) -> Self {
        Self {
            inner,
            store,
            key,
            ttl,
            mode,
            buffered: BytesMut::new(),
            poisoned: false,
        }
    }

    fn commit(&self, body: &[u8]) {
        let snapshot = Snapshot::new(self.inner.status(), self.inner.headers(), body.to_vec());
        match snapshot.encode() {
            Ok(payload) => {
                self.store.set(self.key.as_str(), payload, self.ttl);
                debug!(key = %self.key, bytes = body.len(), "response snapshot committed");
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "dropping response snapshot");
            }
        }
    }
}

impl ResponseWriter for CaptureWriter {
    fn write_header(&mut self, status: StatusCode) {
        self.inner.write_header(status);
    }

    fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut Headers {
        self.inner.headers_mut()
    }

    /// Forwards `data`, then records it.
    ///
    /// # Errors
    ///
    /// - Any error from the live writer; nothing is recorded in that case.
    /// - [`WriteError::Uncacheable`] when the status is not `200 OK`. The bytes
    ///   were still delivered.
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        let n = match self.inner.write(data) {
            Ok(n) => n,
            Err(e) => {
                self.poisoned = true;
                return Err(e);
            }
        };

        let delivered = &data[..n.min(data.len())];
        if self.mode == CaptureMode::WholeResponse {
            self.buffered.put_slice(delivered);
        }

        let status = self.inner.status();
        if status != StatusCode::Ok {
            return Err(WriteError::Uncacheable { status });
        }

        if self.mode == CaptureMode::PerWrite {
            self.commit(delivered);
        }
        Ok(n)
    }

    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn written(&self) -> bool {
        self.inner.written()
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        if let Err(e) = self.inner.flush() {
            self.poisoned = true;
            return Err(e);
        }
        if self.mode != CaptureMode::WholeResponse {
            return Ok(());
        }

        let body = std::mem::take(&mut self.buffered);
        if self.poisoned {
            debug!(key = %self.key, "live write failed, whole response not committed");
        } else if self.inner.status() == StatusCode::Ok {
            self.commit(&body);
        }
        Ok(())
    }

    fn into_response(self: Box<Self>) -> Response {
        self.inner.into_response()
    }
}
