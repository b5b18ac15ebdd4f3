//! # layermux
//!
//! Route groups and ordered middleware on top of a radix-tree multiplexer.
//!
//! Path matching and parameter capture belong to [`matchit`]; connection
//! handling belongs to hyper. What is left for layermux is the structure
//! around them:
//!
//! - **Groups** — a group is a router with a longer prefix and a copy of its
//!   parent's middleware at the moment it was created. Groups nest.
//! - **Middleware** — `use_middleware(m1)` then `use_middleware(m2)` runs
//!   `m1` first on the way in and last on the way out. The stack is baked
//!   into each route when the route is registered.
//! - **Route metadata** — every matched request carries the full registered
//!   pattern (`/api/users/{id}`, not `/api/users/42`), readable from any
//!   layer via [`Request::route_pattern`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use layermux::{middleware, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), layermux::Error> {
//!     let mut app = Router::new();
//!     app.use_middleware(middleware::trace());
//!     app.use_middleware(middleware::recover());
//!
//!     app.group("/api", |api| {
//!         api.get("/users/{id}", get_user);
//!     });
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     // "/api/users/{id}"
//!     let route = req.route_pattern().unwrap_or_default();
//!     Response::json(format!(r#"{{"id":"{id}","route":"{route}"}}"#))
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod table;

pub mod middleware;
pub mod route_pattern;

pub use error::Error;
pub use handler::Handler;
pub use middleware::{Middleware, Next};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
