//! Request fingerprinting.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::Request;

/// Cache key derived from a request's target and body.
///
/// The key is the SHA-256 digest of the target bytes followed by the body bytes
/// (no separator), encoded as unpadded URL-safe base64, so it is always 43
/// characters and safe to embed in any store identifier.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::CacheKey;
///
/// let a = CacheKey::derive("/items?page=2", b"");
/// let b = CacheKey::derive("/items?page=2", b"");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 43);
/// assert_ne!(a, CacheKey::derive("/items?page=3", b""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hashes `target` then `body` into a key.
    pub fn derive(target: &str, body: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(target.as_bytes());
        hasher.update(body);
        Self(URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }

    /// Fingerprints a request without consuming its body.
    ///
    /// A body that cannot be read in full is fingerprinted as empty; the request
    /// is served either way.
    pub fn for_request(request: &Request) -> Self {
        let body = match request.read_body() {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    request_target = %request.target(),
                    error = %e,
                    "request body unreadable — fingerprinting as empty"
                );
                Bytes::new()
            }
        };
        Self::derive(request.target(), &body)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
