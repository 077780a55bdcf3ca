//! Request routing and the handler shapes the server understands.
//!
//! [`Router`] maps a method and an exact path to a response-returning handler.
//! A trailing slash is ignored, so `/report/` reaches the `/report` route, and
//! the query string never takes part in matching.
//!
//! [`Endpoint`] is the other handler shape: it writes through the context's
//! [`ResponseWriter`](crate::http::ResponseWriter) instead of returning a
//! [`Response`]. Endpoints are what [`CacheMiddleware`](crate::cache::CacheMiddleware)
//! wraps, and [`CacheMiddleware::into_handler`](crate::cache::CacheMiddleware::into_handler)
//! turns the wrapped endpoint back into a routable handler.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::{Method, Request, Response, StatusCode};

/// Boxed, `Send` future borrowing from its caller for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered handler after type erasure.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<'static, Response> + Send + Sync + 'static>;

/// Anything the router can register: an async function from [`Context`] to
/// [`Response`]. Implemented for every suitable closure.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> BoxFuture<'static, Response>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<'static, Response> {
        Box::pin(self(ctx))
    }
}

/// A handler that writes its response through the context's writer.
///
/// The context is borrowed, not consumed, so the caller can inspect it (for
/// example [`Context::is_aborted`]) after the endpoint returns.
///
/// Plain functions of the shape `fn(&mut Context) -> BoxFuture<'_, ()>` are
/// endpoints already.
///
/// # Examples
///
/// ```rust
/// use rttp_cache::context::Context;
/// use rttp_cache::router::BoxFuture;
///
/// fn hello(ctx: &mut Context) -> BoxFuture<'_, ()> {
///     Box::pin(async move {
///         let _ = ctx.writer_mut().write_str("hello");
///     })
/// }
/// ```
pub trait Endpoint: Send + Sync + 'static {
    /// Produce the response for `ctx` by writing to [`Context::writer_mut`].
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()>;
}

impl<F> Endpoint for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
        self(ctx)
    }
}

// `/report/` and `/report` name the same route; `/` stays as is.
fn normalize(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

/// Dispatches requests by method and exact path; anything unmatched gets
/// `404 Not Found`.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::{Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::Ok).body("pong") });
/// ```
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, HashMap<String, Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    /// Registers `handler` for any method, e.g. a cached `PUT` or a custom verb.
    /// Registering the same method and path again replaces the earlier handler.
    pub fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes
            .entry(method)
            .or_default()
            .insert(normalize(path).to_owned(), handler);
    }

    /// Number of registered method/path pairs.
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the handler registered for the request's method and path.
    pub async fn route(&self, request: Request) -> Response {
        let handler = self
            .routes
            .get(request.method())
            .and_then(|by_path| by_path.get(normalize(request.path())))
            .cloned();

        match handler {
            Some(handler) => handler(Context::new(request)).await,
            None => Response::new(StatusCode::NotFound),
        }
    }
}
