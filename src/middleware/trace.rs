use std::time::Instant;

use tracing::{Instrument, info, info_span};

use super::{Middleware, Next};
use crate::request::Request;

/// Per-request span with method, path, matched route, status and latency.
///
/// Register it first so the span covers every other layer.
pub fn trace() -> Middleware {
    Middleware::from_fn(|req: Request, next: Next| {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = req.path(),
            route = req.route_pattern().unwrap_or_default(),
        );

        async move {
            let started = Instant::now();
            let res = next.run(req).await;
            info!(
                status = res.status_code().as_u16(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "request completed",
            );
            res
        }
        .instrument(span)
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::middleware::compose;
    use crate::route_pattern;

    #[tokio::test]
    async fn passes_request_and_response_through() {
        let handler = Next::new(|req: Request| async move {
            assert_eq!(req.route_pattern(), Some("/items/{id}"));
            StatusCode::ACCEPTED
        });
        let chain = compose(handler, &[trace()]);

        let req = http::Request::builder().uri("/items/7").body(Bytes::new()).unwrap();
        let res = chain.run(route_pattern::attach(req.into(), "/items/{id}")).await;

        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
    }
}
