//! Handlers and the erased call every middleware layer goes through.
//!
//! A route is stored as one [`BoxedHandler`]. Middleware does not get a
//! special slot in the table: each layer is itself a `BoxedHandler` whose
//! `call` runs some code and then calls the `BoxedHandler` it captured. For a
//! stack `[m1, m2]` around `h` the stored value is four links deep:
//!
//! ```text
//! table ─call─▶ attach pattern ─call─▶ m1 ─call─▶ m2 ─call─▶ HandlerFn(h)
//!                                                               └─ h(req).await.into_response()
//! ```
//!
//! A request therefore costs one vtable call and one boxed future per layer.
//! Layers hold their inner handler through an `Arc`, so a composed chain is
//! shared by every concurrent request on that route and `Next` clones are
//! a reference-count bump.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// What every layer's `call` returns. Owned and `Send` so a chain can run on
/// any worker thread.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// One link in a route's chain: user handlers and middleware layers alike.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A shared link. The outer layer owns a clone of this for its inner one.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// function or closure with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(HandlerFn(self))
    }
}

// ── Innermost link ────────────────────────────────────────────────────────────

/// The end of every chain: calls the user function and converts its output.
/// Layers above it only ever see a [`Response`].
struct HandlerFn<F>(F);

impl<F, Fut, R> ErasedHandler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
