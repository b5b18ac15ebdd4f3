//! Minimal layermux example — a public route, an authenticated API group and
//! route-aware logging.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/healthz
//!   curl http://localhost:3000/api/users/42                      # 401
//!   curl -H 'authorization: token' http://localhost:3000/api/users/42
//!   curl -X DELETE -H 'authorization: token' http://localhost:3000/api/users/42
//!   curl -X PUT http://localhost:3000/healthz                     # 405

use http::StatusCode;
use layermux::{Middleware, Next, Request, Response, Router, Server, middleware};

#[tokio::main]
async fn main() -> Result<(), layermux::Error> {
    tracing_subscriber::fmt::init();

    let mut app = Router::new();
    app.use_middleware(middleware::trace())
        .use_middleware(middleware::recover());

    app.get("/healthz", |_req: Request| async { "ok" });

    app.group("/api", |api| {
        api.use_middleware(require_auth());

        api.get("/users/{id}", get_user)
            .delete("/users/{id}", delete_user);
    });

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

fn require_auth() -> Middleware {
    Middleware::from_fn(|req: Request, next: Next| async move {
        if req.header("authorization").is_none() {
            return Response::status(StatusCode::UNAUTHORIZED);
        }
        next.run(req).await
    })
}

// GET /api/users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    let route = req.route_pattern().unwrap_or_default();
    Response::json(format!(r#"{{"id":"{id}","route":"{route}"}}"#))
}

// DELETE /api/users/{id} → 204 No Content
async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}
