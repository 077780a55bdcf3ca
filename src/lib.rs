//! # rttp-cache
//!
//! An inline response cache for the rttp async HTTP/1.1 server framework.
//!
//! Wrap any writer-driven [`Endpoint`](router::Endpoint) in a
//! [`CacheMiddleware`](cache::CacheMiddleware) and identical requests (same
//! target, same body) are answered from memory until the entry's time-to-live
//! runs out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rttp_cache::cache::{CacheMiddleware, MemoryStore, StoreConfig};
//! use rttp_cache::context::Context;
//! use rttp_cache::router::BoxFuture;
//! use rttp_cache::{Router, Server};
//!
//! fn slow_report(ctx: &mut Context) -> BoxFuture<'_, ()> {
//!     Box::pin(async move {
//!         let _ = ctx.writer_mut().write_str("expensive result");
//!     })
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::start(StoreConfig::new());
//!
//!     let mut router = Router::new();
//!     router.get(
//!         "/report",
//!         CacheMiddleware::new(store, Duration::from_secs(30), slow_report).into_handler(),
//!     );
//!     let router = Arc::new(router);
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server
//!         .run(move |req| {
//!             let router = Arc::clone(&router);
//!             async move { router.route(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
