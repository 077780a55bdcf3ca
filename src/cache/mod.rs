//! Response caching — memoize full responses keyed on a request fingerprint.
//!
//! The pieces, leaf first:
//!
//! - [`Store`] / [`MemoryStore`] — thread-safe map of encoded snapshots with per-entry TTL.
//! - [`CacheKey`] — SHA-256 fingerprint of the request target and body.
//! - [`Snapshot`] — status, header multimap, and body, with its stored encoding.
//! - [`CaptureWriter`] — writer decorator that commits `200 OK` output to the store.
//! - [`CacheMiddleware`] — per-request protocol: replay on hit, capture on miss,
//!   drop the entry when the endpoint aborts.
//!
//! The store is an ordinary value: build it once at startup and hand the same
//! `Arc` to every cached route.
//!
//! This is a naive full-response memoizer. It does not negotiate `Cache-Control`,
//! `ETag`, or `Vary`, and it does not coalesce concurrent misses.

mod capture;
mod key;
mod middleware;
mod snapshot;
mod store;

pub use capture::{CaptureMode, CaptureWriter};
pub use key::CacheKey;
pub use middleware::CacheMiddleware;
pub use snapshot::{CodecError, Snapshot};
pub use store::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, MemoryStore, Store, StoreConfig};
