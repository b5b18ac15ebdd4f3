//! Route registration, groups and middleware stacks.
//!
//! A [`Router`] is a view onto one shared dispatch table: a path prefix plus
//! an ordered middleware list. The root and every group created from it write
//! into the same table. Middleware is baked into each route when it is
//! registered, so the order of `use_middleware` and registration calls is
//! the order you get.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::Method;
use tracing::{debug, warn};

use crate::error::Error;
use crate::handler::Handler;
use crate::middleware::{self, Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::route_pattern;
use crate::table::DispatchTable;

/// The application router.
///
/// Build it once at startup, then pass it to
/// [`Server::serve`](crate::Server::serve). Registration methods return
/// `&mut Self` so calls chain.
///
/// ```rust
/// use layermux::{Request, Router};
///
/// # async fn list_users(_: Request) -> &'static str { "" }
/// # async fn get_user(_: Request) -> &'static str { "" }
/// # async fn health(_: Request) -> &'static str { "" }
/// let mut app = Router::new();
/// app.use_middleware(layermux::middleware::recover());
/// app.get("/healthz", health);
///
/// app.group("/api", |api| {
///     api.use_middleware(layermux::middleware::trace());
///     api.get("/users", list_users)
///        .get("/users/{id}", get_user);
/// });
/// ```
pub struct Router {
    table: Arc<Mutex<DispatchTable>>,
    middleware: Vec<Middleware>,
    prefix: String,
}

impl Router {
    /// A root router: empty prefix, no middleware, a fresh table.
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(DispatchTable::default())),
            middleware: Vec::new(),
            prefix: String::new(),
        }
    }

    /// The prefix prepended to every pattern registered here.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Appends `mw` to this router's stack.
    ///
    /// Applies to routes registered on this router, and to groups created
    /// from it, *after* this call. Routes already registered keep the stack
    /// they were built with.
    pub fn use_middleware(&mut self, mw: Middleware) -> &mut Self {
        self.middleware.push(mw);
        self
    }

    /// Appends several middlewares, in iteration order.
    pub fn use_middlewares(&mut self, mws: impl IntoIterator<Item = Middleware>) -> &mut Self {
        self.middleware.extend(mws);
        self
    }

    /// Runs `build` with a child router that shares this router's table.
    ///
    /// The child's prefix is this router's prefix followed by `prefix`,
    /// joined verbatim: `"/api"` + `"/v1"` is `"/api/v1"`, `"/api"` + `"v1"`
    /// is `"/apiv1"`. Its middleware starts as a copy of this router's
    /// current stack; later `use_middleware` calls on either side stay on
    /// that side.
    pub fn group(&mut self, prefix: &str, build: impl FnOnce(&mut Router)) -> &mut Self {
        let mut child = Router {
            table: Arc::clone(&self.table),
            middleware: self.middleware.clone(),
            prefix: format!("{}{}", self.prefix, prefix),
        };
        build(&mut child);
        self
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn head(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::HEAD, pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::OPTIONS, pattern, handler)
    }

    /// Registers `handler` for `method` at `prefix + pattern`.
    ///
    /// # Panics
    ///
    /// Panics if the table rejects the route, e.g. the same method and
    /// pattern were already registered. Use [`try_route`](Self::try_route)
    /// to get the error instead.
    pub fn route(&mut self, method: Method, pattern: &str, handler: impl Handler) -> &mut Self {
        if let Err(e) = self.try_route(method, pattern, handler) {
            match &e {
                Error::Route { source, .. } => panic!("{e}: {source}"),
                _ => panic!("{e}"),
            }
        }
        self
    }

    /// Registers `handler` for `method` at `prefix + pattern`, wrapped in
    /// this router's current middleware.
    ///
    /// Every request reaching the route carries the full pattern (not the
    /// concrete path) as its [`route_pattern`](Request::route_pattern),
    /// visible to every layer and to the handler.
    pub fn try_route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<&mut Self, Error> {
        let full: Arc<str> = format!("{}{}", self.prefix, pattern).into();

        let chain = middleware::compose(Next::new(handler), &self.middleware);
        let endpoint = {
            let full = Arc::clone(&full);
            Next::new(move |req: Request| {
                let chain = chain.clone();
                let req = route_pattern::attach(req, Arc::clone(&full));
                async move { chain.run(req).await }
            })
        };

        self.table()
            .insert(method.clone(), &full, endpoint.into_boxed_handler())
            .map_err(|source| Error::Route {
                method: method.clone(),
                pattern: full.to_string(),
                source,
            })?;

        debug!(%method, pattern = &*full, layers = self.middleware.len(), "route registered");
        Ok(self)
    }

    /// Dispatches one request in-process.
    ///
    /// Unmatched requests get the table's own `404` / `405` answers.
    pub async fn handle(&self, req: Request) -> Response {
        let lookup = self.table().lookup(req.method(), req.path());
        lookup.respond(req).await
    }

    /// Freezes the shared table for serving.
    ///
    /// Takes the table without copying when this is the last handle to it,
    /// which is the normal case once every group builder has returned. If a
    /// group handle outlived its builder, the table is cloned so that handle
    /// keeps every route; routes it registers afterwards are not served.
    pub(crate) fn into_table(self) -> DispatchTable {
        match Arc::try_unwrap(self.table) {
            Ok(table) => table.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => {
                warn!(
                    handles = Arc::strong_count(&shared) - 1,
                    "router handles still alive when serving starts; later registrations on them are ignored",
                );
                lock(&shared).clone()
            }
        }
    }

    fn table(&self) -> MutexGuard<'_, DispatchTable> {
        lock(&self.table)
    }
}

// Registration runs single-threaded at startup; a poisoned lock only means a
// builder panicked, and the table itself is never left half-updated.
fn lock(table: &Mutex<DispatchTable>) -> MutexGuard<'_, DispatchTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}
