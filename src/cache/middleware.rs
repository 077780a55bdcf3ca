//! The cache decision protocol wrapped around a single endpoint.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::{CacheKey, CaptureMode, CaptureWriter, Snapshot, Store};
use crate::context::Context;
use crate::router::Endpoint;
use crate::Response;

/// Memoizes the full response of an [`Endpoint`] for a fixed time-to-live.
///
/// Each request is fingerprinted with [`CacheKey::for_request`]. On a hit the
/// stored status, headers, and body are replayed and the endpoint is not called.
/// On a miss the endpoint runs with a [`CaptureWriter`] in place of the live
/// writer, which records `200 OK` output as it is written.
///
/// Concurrent misses for the same key all run the endpoint; the last commit wins.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use rttp_cache::cache::{CacheMiddleware, MemoryStore, StoreConfig};
/// use rttp_cache::context::Context;
/// use rttp_cache::router::{BoxFuture, Router};
///
/// fn report(ctx: &mut Context) -> BoxFuture<'_, ()> {
///     Box::pin(async move {
///         let _ = ctx.writer_mut().write_str("expensive report");
///     })
/// }
///
/// # async fn setup() {
/// let store = MemoryStore::start(StoreConfig::new());
/// let mut router = Router::new();
/// router.get(
///     "/report",
///     CacheMiddleware::new(store, Duration::from_secs(30), report).into_handler(),
/// );
/// # }
/// ```
pub struct CacheMiddleware<E> {
    store: Arc<dyn Store>,
    ttl: Duration,
    mode: CaptureMode,
    endpoint: E,
}

impl<E: Endpoint> CacheMiddleware<E> {
    /// Wraps `endpoint`, caching its responses in `store` for `ttl`.
    pub fn new(store: Arc<dyn Store>, ttl: Duration, endpoint: E) -> Self {
        Self {
            store,
            ttl,
            mode: CaptureMode::default(),
            endpoint,
        }
    }

    /// Chooses when captured output is committed. Defaults to [`CaptureMode::PerWrite`].
    #[must_use]
    pub fn capture_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }

    /// Serves one request in place, either by replay or by running the endpoint.
    ///
    /// No cache failure is surfaced to the caller; every failure degrades to
    /// serving the request as if caching were absent.
    pub async fn handle(&self, ctx: &mut Context) {
        let key = CacheKey::for_request(ctx.request());

        if let Some(snapshot) = self.lookup(&key) {
            debug!(key = %key, "cache hit");
            if let Err(e) = snapshot.replay(ctx.writer_mut()) {
                self.store.delete(key.as_str());
                error!(
                    key = %key,
                    error = %e,
                    status = snapshot.status().as_u16(),
                    "cannot replay cached response, entry dropped"
                );
            }
            return;
        }

        debug!(key = %key, "cache miss");
        let store = Arc::clone(&self.store);
        let (capture_key, ttl, mode) = (key.clone(), self.ttl, self.mode);
        ctx.wrap_writer(move |live| {
            Box::new(CaptureWriter::new(live, store, capture_key, ttl, mode))
        });

        self.endpoint.call(ctx).await;

        if ctx.is_aborted() {
            self.store.delete(key.as_str());
            debug!(key = %key, "request aborted, cache entry dropped");
            return;
        }

        if let Err(e) = ctx.writer_mut().flush() {
            warn!(key = %key, error = %e, "failed to finalize response");
        }
    }

    /// Serves `ctx` and returns the finished response.
    pub async fn serve(&self, mut ctx: Context) -> Response {
        self.handle(&mut ctx).await;
        ctx.into_response()
    }

    /// Converts the middleware into a handler accepted by [`Router`](crate::router::Router).
    pub fn into_handler(
        self,
    ) -> impl Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static
    {
        let this = Arc::new(self);
        move |ctx: Context| -> Pin<Box<dyn Future<Output = Response> + Send>> {
            let this = Arc::clone(&this);
            Box::pin(async move { this.serve(ctx).await })
        }
    }

    // Undecodable payloads count as misses and stay in the store.
    fn lookup(&self, key: &CacheKey) -> Option<Snapshot> {
        let payload = self.store.get(key.as_str())?;
        match Snapshot::decode(&payload) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring undecodable cache entry");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use tokio::sync::Barrier;

    use super::*;
    use crate::cache::{MemoryStore, StoreConfig};
    use crate::http::{Headers, ResponseWriter, StatusCode, WriteError};
    use crate::router::BoxFuture;
    use crate::{Request, Router};

    const TTL: Duration = Duration::from_secs(60);

    /// Endpoint that counts its invocations and writes a fixed response once.
    struct Counting {
        calls: Arc<AtomicUsize>,
        status: StatusCode,
        body: &'static str,
        abort: bool,
    }

    impl Counting {
        fn ok(body: &'static str) -> (Self, Arc<AtomicUsize>) {
            Self::with_status(StatusCode::Ok, body)
        }

        fn with_status(status: StatusCode, body: &'static str) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let endpoint = Self {
                calls: Arc::clone(&calls),
                status,
                body,
                abort: false,
            };
            (endpoint, calls)
        }

        fn aborting(mut self) -> Self {
            self.abort = true;
            self
        }
    }

    impl Endpoint for Counting {
        fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                let writer = ctx.writer_mut();
                writer.write_header(self.status);
                writer.headers_mut().insert("X-Call", n.to_string());
                writer.headers_mut().insert("Set-Cookie", "a=1");
                writer.headers_mut().insert("Set-Cookie", "b=2");
                let _ = writer.write_str(self.body);
                if self.abort {
                    ctx.abort();
                }
            })
        }
    }

    /// Endpoint that echoes the request body it observes.
    struct Echo;

    impl Endpoint for Echo {
        fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                let body = ctx.request().body().clone();
                let _ = ctx.writer_mut().write(&body);
            })
        }
    }

    /// Live writer standing in for a client that has gone away.
    #[derive(Default)]
    struct Disconnected {
        headers: Headers,
        status: Option<StatusCode>,
    }

    impl ResponseWriter for Disconnected {
        fn write_header(&mut self, status: StatusCode) {
            self.status = Some(status);
        }
        fn headers(&self) -> &Headers {
            &self.headers
        }
        fn headers_mut(&mut self) -> &mut Headers {
            &mut self.headers
        }
        fn write(&mut self, _data: &[u8]) -> Result<usize, WriteError> {
            Err(WriteError::Closed)
        }
        fn status(&self) -> StatusCode {
            self.status.unwrap_or(StatusCode::Ok)
        }
        fn written(&self) -> bool {
            self.status.is_some()
        }
        fn into_response(self: Box<Self>) -> Response {
            Response::new(self.status())
        }
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(&StoreConfig::new()))
    }

    fn get(target: &str) -> Context {
        let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Context::new(Request::parse(raw.as_bytes()).unwrap().0)
    }

    fn post(target: &str, body: &str) -> Context {
        let raw = format!(
            "POST {target} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        Context::new(Request::parse(raw.as_bytes()).unwrap().0)
    }

    #[tokio::test]
    async fn second_identical_request_is_replayed() {
        let store = store();
        let (endpoint, calls) = Counting::ok("fresh");
        let cache = CacheMiddleware::new(store.clone(), TTL, endpoint);

        let first = cache.serve(get("/items?page=1")).await;
        let second = cache.serve(get("/items?page=1")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.status(), StatusCode::Ok);
        assert_eq!(second.status(), StatusCode::Ok);
        assert_eq!(second.body_ref(), b"fresh");
        assert_eq!(second.headers().get("x-call"), Some("1"));
        let cookies: Vec<_> = second.headers().get_all("set-cookie").collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn different_targets_or_bodies_miss() {
        let (endpoint, calls) = Counting::ok("x");
        let cache = CacheMiddleware::new(store(), TTL, endpoint);

        cache.serve(get("/a")).await;
        cache.serve(get("/b")).await;
        cache.serve(post("/a", "one")).await;
        cache.serve(post("/a", "two")).await;
        cache.serve(post("/a", "one")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let (endpoint, calls) = Counting::ok("short-lived");
        let cache = CacheMiddleware::new(store(), Duration::from_millis(30), endpoint);

        cache.serve(get("/ttl")).await;
        cache.serve(get("/ttl")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let response = cache.serve(get("/ttl")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(response.headers().get("x-call"), Some("2"));
    }

    #[tokio::test]
    async fn non_ok_responses_are_not_cached() {
        let store = store();
        let (endpoint, calls) = Counting::with_status(StatusCode::NotFound, "nope");
        let cache = CacheMiddleware::new(store.clone(), TTL, endpoint);

        let first = cache.serve(get("/missing")).await;
        assert_eq!(first.status(), StatusCode::NotFound);
        assert_eq!(first.body_ref(), b"nope");
        assert!(store.is_empty());

        cache.serve(get("/missing")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn aborted_request_drops_its_entry() {
        let store = store();
        let (endpoint, calls) = Counting::ok("written then aborted");
        let cache = CacheMiddleware::new(store.clone(), TTL, endpoint.aborting());

        let response = cache.serve(get("/abort")).await;
        assert_eq!(response.body_ref(), b"written then aborted");
        assert!(store.is_empty());

        cache.serve(get("/abort")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn endpoint_still_sees_the_full_body() {
        let cache = CacheMiddleware::new(store(), TTL, Echo);
        let response = cache.serve(post("/echo", "payload bytes")).await;
        assert_eq!(response.body_ref(), b"payload bytes");
    }

    #[tokio::test]
    async fn undecodable_entry_is_treated_as_miss() {
        let store = store();
        let key = CacheKey::derive("/corrupt", b"");
        store.set(key.as_str(), Bytes::from_static(b"garbage"), TTL);

        let (endpoint, calls) = Counting::ok("rebuilt");
        let cache = CacheMiddleware::new(store.clone(), TTL, endpoint);
        let response = cache.serve(get("/corrupt")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.body_ref(), b"rebuilt");
        let payload = store.get(key.as_str()).unwrap();
        assert_eq!(Snapshot::decode(&payload).unwrap().body().as_ref(), b"rebuilt");
    }

    #[tokio::test]
    async fn failed_replay_drops_the_entry() {
        let store = store();
        let (endpoint, calls) = Counting::ok("cached");
        let cache = CacheMiddleware::new(store.clone(), TTL, endpoint);
        cache.serve(get("/flaky")).await;
        assert_eq!(store.len(), 1);

        let (request, _) = Request::parse(b"GET /flaky HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        let mut ctx = Context::with_writer(request, Box::new(Disconnected::default()));
        cache.handle(&mut ctx).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn whole_response_mode_caches_multi_write_bodies() {
        struct Chunked;

        impl Endpoint for Chunked {
            fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
                Box::pin(async move {
                    for chunk in ["a", "b", "c"] {
                        let _ = ctx.writer_mut().write_str(chunk);
                    }
                })
            }
        }

        let store = store();
        let cache = CacheMiddleware::new(store.clone(), TTL, Chunked)
            .capture_mode(CaptureMode::WholeResponse);
        cache.serve(get("/chunks")).await;

        let payload = store.get(CacheKey::derive("/chunks", b"").as_str()).unwrap();
        assert_eq!(Snapshot::decode(&payload).unwrap().body().as_ref(), b"abc");
    }

    #[tokio::test]
    async fn whole_response_replays_exactly_what_was_delivered() {
        struct Settling;

        impl Endpoint for Settling {
            fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
                Box::pin(async move {
                    let writer = ctx.writer_mut();
                    writer.write_header(StatusCode::Accepted);
                    let _ = writer.write_str("head-");
                    writer.write_header(StatusCode::Ok);
                    let _ = writer.write_str("tail");
                })
            }
        }

        let cache = CacheMiddleware::new(store(), TTL, Settling)
            .capture_mode(CaptureMode::WholeResponse);
        let first = cache.serve(get("/settling")).await;
        let replayed = cache.serve(get("/settling")).await;
        assert_eq!(first.body_ref(), b"head-tail");
        assert_eq!(replayed.status(), StatusCode::Ok);
        assert_eq!(replayed.body_ref(), first.body_ref());
    }

    #[tokio::test]
    async fn cached_endpoint_routes_through_router() {
        let (endpoint, calls) = Counting::ok("routed");
        let mut router = Router::new();
        router.get(
            "/routed",
            CacheMiddleware::new(store(), TTL, endpoint).into_handler(),
        );

        for _ in 0..3 {
            let (request, _) =
                Request::parse(b"GET /routed HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
            let response = router.route(request).await;
            assert_eq!(response.body_ref(), b"routed");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_all_run_and_leave_one_entry() {
        const N: usize = 8;

        struct Gated {
            calls: AtomicUsize,
            gate: Barrier,
        }

        impl Endpoint for Gated {
            fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
                Box::pin(async move {
                    let n = self.calls.fetch_add(1, Ordering::SeqCst);
                    // Hold every request inside the endpoint until all of them missed.
                    self.gate.wait().await;
                    let _ = ctx.writer_mut().write_str(&format!("winner-{n}"));
                })
            }
        }

        let store = store();
        let endpoint = Gated {
            calls: AtomicUsize::new(0),
            gate: Barrier::new(N),
        };
        let cache = Arc::new(CacheMiddleware::new(store.clone(), TTL, endpoint));

        let tasks: Vec<_> = (0..N)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.serve(get("/stampede")).await })
            })
            .collect();
        for task in tasks {
            let response = task.await.unwrap();
            assert_eq!(response.status(), StatusCode::Ok);
        }

        assert_eq!(cache.endpoint.calls.load(Ordering::SeqCst), N);
        assert_eq!(store.len(), 1);
        let payload = store.get(CacheKey::derive("/stampede", b"").as_str()).unwrap();
        let snapshot = Snapshot::decode(&payload).unwrap();
        assert!(snapshot.body().starts_with(b"winner-"));
    }
}
