//! Matched-route metadata carried in the request's extensions.
//!
//! The value is keyed by a private type, so no other layer can read, shadow
//! or overwrite it by accident: `Extensions` is a type map, and nobody outside
//! this module can name [`RoutePattern`].

use std::sync::Arc;

use crate::request::Request;

#[derive(Clone, Debug)]
struct RoutePattern(Arc<str>);

/// Returns `req` carrying `pattern` as its matched route pattern.
///
/// Attaching again replaces the previous value.
pub fn attach(mut req: Request, pattern: impl Into<Arc<str>>) -> Request {
    req.extensions_mut().insert(RoutePattern(pattern.into()));
    req
}

/// Reads the pattern attached by [`attach`], if any.
pub fn read(req: &Request) -> Option<&str> {
    req.extensions().get::<RoutePattern>().map(|p| &*p.0)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn request(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Bytes::new()).unwrap().into()
    }

    #[test]
    fn absent_until_attached() {
        assert_eq!(read(&request("/users/42")), None);
    }

    #[test]
    fn attach_then_read() {
        let req = attach(request("/users/42"), "/users/{id}");
        assert_eq!(read(&req), Some("/users/{id}"));
        assert_eq!(req.path(), "/users/42");
    }

    #[test]
    fn string_typed_extension_does_not_collide() {
        let mut req = request("/");
        req.extensions_mut().insert(String::from("/spoofed"));
        req.extensions_mut().insert(Arc::<str>::from("/spoofed"));
        assert_eq!(read(&req), None);

        let req = attach(req, "/real");
        assert_eq!(read(&req), Some("/real"));
        assert_eq!(req.extensions().get::<String>().map(String::as_str), Some("/spoofed"));
    }
}
