//! Serves a deliberately slow endpoint behind the response cache.
//!
//! ```text
//! RUST_LOG=rttp_cache=debug cargo run --example cached_server
//! curl -i http://127.0.0.1:8080/slow?name=world   # ~500 ms
//! curl -i http://127.0.0.1:8080/slow?name=world   # replayed
//! curl -i http://127.0.0.1:8080/missing           # 404, never cached
//! ```

use std::sync::Arc;
use std::time::Duration;

use rttp_cache::cache::{CacheMiddleware, CaptureMode, MemoryStore, StoreConfig};
use rttp_cache::context::Context;
use rttp_cache::router::BoxFuture;
use rttp_cache::{Router, Server, StatusCode};
use tracing_subscriber::EnvFilter;

fn slow_greeting(ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let name = ctx.request().query_param("name").unwrap_or("stranger").to_owned();
        let writer = ctx.writer_mut();
        writer.headers_mut().insert("Content-Type", "text/plain; charset=utf-8");
        let _ = writer.write_str(&format!("Hello, {name}!"));
    })
}

fn missing(ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        ctx.writer_mut().write_header(StatusCode::NotFound);
        let _ = ctx.writer_mut().write_str("nothing here");
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = MemoryStore::start(StoreConfig::new().sweep_interval(Duration::from_secs(60)));

    let mut router = Router::new();
    router.get(
        "/slow",
        CacheMiddleware::new(store.clone(), Duration::from_secs(30), slow_greeting)
            .capture_mode(CaptureMode::WholeResponse)
            .into_handler(),
    );
    router.get(
        "/missing",
        CacheMiddleware::new(store, Duration::from_secs(30), missing).into_handler(),
    );
    let router = Arc::new(router);

    let server = Server::bind("127.0.0.1:8080").await?;
    println!("Listening on http://{}", server.local_addr());
    server
        .run(move |req| {
            let router = Arc::clone(&router);
            async move { router.route(req).await }
        })
        .await?;
    Ok(())
}
