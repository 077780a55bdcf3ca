//! Captured responses and their stored encoding.
//!
//! A [`Snapshot`] is encoded as JSON with the body in standard base64:
//!
//! ```text
//! {"status":200,"headers":{"Content-Type":["text/plain"]},"body":"aGVsbG8="}
//! ```

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{Headers, ResponseWriter, StatusCode, WriteError};

/// Errors from encoding or decoding a [`Snapshot`].
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode response snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("corrupt response snapshot: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A complete response eligible for replay: status, header multimap, and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    status: StatusCode,
    headers: BTreeMap<String, Vec<String>>,
    #[serde(with = "body_base64")]
    body: Bytes,
}

impl Snapshot {
    /// Builds a snapshot from a status, the full header set, and body bytes.
    pub fn new(status: StatusCode, headers: &Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: headers.grouped(),
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Header values keyed by name; a name may carry several values in order.
    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the snapshot into the payload kept by the store.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(CodecError::Encode)
    }

    /// Parses a stored payload.
    ///
    /// # Errors
    ///
    /// [`CodecError::Decode`] for anything that is not a well-formed snapshot,
    /// including unknown status codes and invalid base64 bodies.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }

    /// Writes status, every header value, and the body to `writer`.
    ///
    /// # Errors
    ///
    /// Whatever the writer returns for the body write.
    pub fn replay(&self, writer: &mut dyn ResponseWriter) -> Result<usize, WriteError> {
        writer.write_header(self.status);
        let headers = writer.headers_mut();
        for (name, values) in &self.headers {
            for value in values {
                headers.insert(name.as_str(), value.as_str());
            }
        }
        writer.write(&self.body)
    }
}

mod body_base64 {
    use super::*;
    use serde::{Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(de::Error::custom)
    }
}
