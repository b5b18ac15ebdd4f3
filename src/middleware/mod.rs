//! Middleware layer.
//!
//! A [`Middleware`] turns the next handler in the chain into a new handler
//! that wraps it. Cross-cutting concerns live here: structured tracing, panic
//! recovery, authentication-header inspection, request-id injection.
//!
//! Layers run in registration order. For `[m1, m2]` around handler `h` the
//! composed handler is `m1(m2(h))`, so `m1` sees the request first and the
//! response last:
//!
//! ```text
//! m1 before → m2 before → h → m2 after → m1 after
//! ```
//!
//! ```rust
//! use http::StatusCode;
//! use layermux::{Middleware, Next, Request, Response, Router};
//!
//! let auth = Middleware::from_fn(|req: Request, next: Next| async move {
//!     if req.header("authorization").is_none() {
//!         return Response::status(StatusCode::UNAUTHORIZED);
//!     }
//!     next.run(req).await
//! });
//!
//! let mut app = Router::new();
//! app.use_middleware(layermux::middleware::trace());
//! app.group("/admin", |admin| {
//!     admin.use_middleware(auth);
//! });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

mod recover;
mod trace;

pub use recover::recover;
pub use trace::trace;

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain, as seen from inside a middleware.
///
/// Cloning is one atomic increment; the wrapped handler is shared.
#[derive(Clone)]
pub struct Next(BoxedHandler);

impl Next {
    pub fn new(handler: impl Handler) -> Self {
        Self(handler.into_boxed_handler())
    }

    /// Runs the remainder of the chain.
    pub async fn run(&self, req: Request) -> Response {
        self.0.call(req).await
    }

    pub(crate) fn into_boxed_handler(self) -> BoxedHandler {
        self.0
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

// ── Middleware ────────────────────────────────────────────────────────────────

type Transform = dyn Fn(Next) -> Next + Send + Sync + 'static;

/// A handler-to-handler transformation.
///
/// Stateless by construction: it is applied once per route at registration
/// time, never per request. The same value can be registered on any number
/// of routers.
#[derive(Clone)]
pub struct Middleware(Arc<Transform>);

impl Middleware {
    /// Wraps a raw transformer.
    ///
    /// ```rust
    /// use layermux::{Middleware, Next, Request};
    ///
    /// let passthrough = Middleware::new(|next: Next| {
    ///     Next::new(move |req: Request| {
    ///         let next = next.clone();
    ///         async move { next.run(req).await }
    ///     })
    /// });
    /// ```
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(Next) -> Next + Send + Sync + 'static,
    {
        Self(Arc::new(transform))
    }

    /// Builds a middleware from an async function that receives the request
    /// and the rest of the chain.
    pub fn from_fn<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |next: Next| {
            let f = Arc::clone(&f);
            Next::new(move |req: Request| (*f)(req, next.clone()))
        })
    }

    pub(crate) fn wrap(&self, next: Next) -> Next {
        (self.0)(next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

// ── Composition ───────────────────────────────────────────────────────────────

/// Wraps `handler` in `layers` so that `layers[0]` is the outermost.
///
/// Folds from the innermost layer outward: `[m1, m2, m3]` yields
/// `m1(m2(m3(handler)))`.
pub fn compose(handler: Next, layers: &[Middleware]) -> Next {
    layers.iter().rev().fold(handler, |inner, layer| layer.wrap(inner))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> Middleware {
        let log = Arc::clone(log);
        Middleware::from_fn(move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name} before"));
                let res = next.run(req).await;
                log.lock().unwrap().push(format!("{name} after"));
                res
            }
        })
    }

    fn terminal(log: &Log) -> Next {
        let log = Arc::clone(log);
        Next::new(move |_req: Request| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("handler".to_owned());
                "ok"
            }
        })
    }

    fn request() -> Request {
        http::Request::builder().uri("/").body(Bytes::new()).unwrap().into()
    }

    #[tokio::test]
    async fn first_registered_is_outermost() {
        let log: Log = Arc::default();
        let chain = compose(terminal(&log), &[recorder(&log, "m1"), recorder(&log, "m2")]);

        chain.run(request()).await;

        assert_eq!(
            *log.lock().unwrap(),
            ["m1 before", "m2 before", "handler", "m2 after", "m1 after"],
        );
    }

    #[tokio::test]
    async fn empty_stack_is_the_handler_itself() {
        let log: Log = Arc::default();
        let res = compose(terminal(&log), &[]).run(request()).await;

        assert_eq!(res.body().as_ref(), b"ok");
        assert_eq!(*log.lock().unwrap(), ["handler"]);
    }

    #[tokio::test]
    async fn layer_can_short_circuit() {
        let log: Log = Arc::default();
        let deny = Middleware::from_fn(|_req: Request, _next: Next| async {
            http::StatusCode::FORBIDDEN
        });
        let chain = compose(terminal(&log), &[recorder(&log, "outer"), deny]);

        let res = chain.run(request()).await;

        assert_eq!(res.status_code(), http::StatusCode::FORBIDDEN);
        assert_eq!(*log.lock().unwrap(), ["outer before", "outer after"]);
    }

    #[tokio::test]
    async fn composing_twice_reuses_the_same_layers() {
        let log: Log = Arc::default();
        let layers = [recorder(&log, "m")];

        let a = compose(terminal(&log), &layers);
        let b = compose(terminal(&log), &layers);
        a.run(request()).await;
        b.run(request()).await;

        assert_eq!(log.lock().unwrap().len(), 6);
    }
}
