//! Tokio TCP server speaking HTTP/1.1 with keep-alive.
//!
//! Each connection runs on its own task, so requests are handled concurrently
//! and anything handlers share (such as a
//! [`MemoryStore`](crate::cache::MemoryStore)) synchronizes internally.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request (head plus body) a connection will buffer (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// A bound TCP listener that serves HTTP/1.1.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::http::{Response, StatusCode};
/// use rttp_cache::server::Server;
///
/// # async fn serve() -> Result<(), rttp_cache::ServerError> {
/// let server = Server::bind("127.0.0.1:8080").await?;
/// server
///     .run(|_req| async { Response::new(StatusCode::Ok).body("Hello!") })
///     .await
/// # }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections forever, answering each request with `handler`.
    ///
    /// Accept failures are logged and skipped, so in practice this only returns
    /// when the task running it is dropped.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "rttp-cache listening");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "connection accepted");
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, peer, handler.as_ref()).await {
                            warn!(peer = %peer, error = %e, "connection closed with error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }
}

// What the bytes buffered so far amount to.
#[derive(Debug)]
enum Frame {
    NeedMore,
    Ready { request: Request, len: usize },
    Reject { status: StatusCode, reason: String },
}

fn next_frame(buf: &[u8]) -> Frame {
    let too_large = || Frame::Reject {
        status: StatusCode::PayloadTooLarge,
        reason: format!("request exceeds {MAX_REQUEST_SIZE} bytes"),
    };

    match Request::parse(buf) {
        Err(RequestError::Incomplete) if buf.len() > MAX_REQUEST_SIZE => too_large(),
        Err(RequestError::Incomplete) => Frame::NeedMore,
        Err(e) => Frame::Reject {
            status: StatusCode::BadRequest,
            reason: format!("Bad Request: {e}"),
        },
        Ok((request, body_offset)) => {
            let declared = request.content_length().unwrap_or(0);
            match body_offset.checked_add(declared) {
                Some(len) if len > MAX_REQUEST_SIZE => too_large(),
                Some(len) if buf.len() >= len => Frame::Ready { request, len },
                Some(_) => Frame::NeedMore,
                None => too_large(),
            }
        }
    }
}

// Serves requests from one connection until the peer closes it, asks for
// `Connection: close`, or sends something unacceptable.
async fn serve_connection<H, F>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: &H,
) -> std::io::Result<()>
where
    H: Fn(Request) -> F,
    F: Future<Output = Response>,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        match next_frame(&buf) {
            Frame::Ready { request, len } => {
                let keep_alive = request.is_keep_alive();
                debug!(
                    peer = %peer,
                    method = %request.method(),
                    path = %request.path(),
                    "dispatching request"
                );
                let response = handler(request).await.keep_alive(keep_alive);
                stream.write_all(&response.into_bytes()).await?;
                stream.flush().await?;
                buf.advance(len);
                if !keep_alive {
                    return Ok(());
                }
                // Pipelined requests may already be buffered.
                continue;
            }
            Frame::Reject { status, reason } => {
                warn!(peer = %peer, status = status.as_u16(), reason = %reason, "rejecting request");
                let response = Response::new(status).body(reason).keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                return Ok(());
            }
            Frame::NeedMore => {}
        }

        if stream.read_buf(&mut buf).await? == 0 {
            debug!(peer = %peer, "connection closed by peer");
            return Ok(());
        }
    }
}
