//! HTTP server and graceful shutdown.
//!
//! The server owns no routing logic. It accepts connections, buffers each
//! request body, and hands the request to the frozen dispatch table built by
//! a [`Router`].
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **SIGINT** (or when the future passed to
//! [`Server::serve_with_shutdown`] resolves) the server:
//! 1. Immediately stops `listener.accept()`.
//! 2. Tells every open connection to shut down: idle keep-alive and HTTP/2
//!    connections close at once, a request already being handled finishes
//!    and its response is sent first.
//! 3. Returns from `serve` once the last connection is gone, which lets
//!    `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::table::DispatchTable;

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), layermux::Error> {
    /// use layermux::{Router, Server};
    ///
    /// Server::bind("0.0.0.0:3000")?.serve(Router::new()).await
    /// # }
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse::<SocketAddr>().map_err(|source| Error::Addr { addr: addr.to_owned(), source })?;
        Ok(Self { bind: Bind::Addr(addr) })
    }

    /// Serves on an already bound listener, e.g. one bound to port 0.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener) }
    }

    /// Accepts connections until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Accepts connections until `signal` resolves, then drains.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let addr = listener.local_addr()?;

        // Registration is over: from here on the table is read-only and
        // shared across connection tasks without a lock.
        let table = Arc::new(router.into_table());

        info!(%addr, "layermux listening");

        let builder = ConnBuilder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting even if
                // more connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let table = Arc::clone(&table);
                    let io = TokioIo::new(stream);

                    let svc = service_fn(move |req| {
                        let table = Arc::clone(&table);
                        async move { dispatch(table, req).await }
                    });

                    // `auto::Builder` handles both HTTP/1.1 and HTTP/2. The
                    // watcher lets shutdown close the connection between
                    // requests instead of waiting for the client to hang up.
                    let conn = graceful.watch(builder.serve_connection(io, svc).into_owned());

                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: signal every watched connection, wait for each to finish
        // its current response and close, then reap the tasks.
        graceful.shutdown().await;
        while tasks.join_next().await.is_some() {}

        info!("layermux stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers one request and runs it through the table.
///
/// Never fails towards hyper: routing misses and unreadable bodies are
/// answered with 404 / 405 / 400.
async fn dispatch(
    table: Arc<DispatchTable>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (head, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(method = %head.method, path = head.uri.path(), "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_http());
        }
    };

    let response = table.dispatch(Request::from_parts(head, body)).await;
    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT the process receives.
///
/// A signal source that cannot be installed is logged and ignored; the other
/// one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
