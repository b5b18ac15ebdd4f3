use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::error;

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Turns a panic anywhere below this layer into `500 Internal Server Error`.
///
/// Without it a panicking handler aborts its connection task and the client
/// sees a reset instead of a response.
pub fn recover() -> Middleware {
    Middleware::from_fn(|req: Request, next: Next| async move {
        let method = req.method().clone();
        let path = req.path().to_owned();

        match AssertUnwindSafe(next.run(req)).catch_unwind().await {
            Ok(res) => res,
            Err(payload) => {
                error!(%method, path = %path, panic = panic_message(&*payload), "handler panicked");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::middleware::compose;

    fn request() -> Request {
        http::Request::builder().uri("/boom").body(Bytes::new()).unwrap().into()
    }

    #[tokio::test]
    async fn panic_becomes_500() {
        let handler = Next::new(|_req: Request| async move {
            if true {
                panic!("kaboom");
            }
            "unreachable"
        });

        let res = compose(handler, &[recover()]).run(request()).await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn normal_response_untouched() {
        let handler = Next::new(|_req: Request| async { "fine" });

        let res = compose(handler, &[recover()]).run(request()).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"fine");
    }

    #[test]
    fn message_from_both_payload_kinds() {
        let s: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(&*s), "static");
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*other), "<non-string panic payload>");
    }
}
