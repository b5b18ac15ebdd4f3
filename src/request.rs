//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri};

use crate::route_pattern;

/// An incoming HTTP request with its body fully buffered.
///
/// The request's [`Extensions`] are its per-call context: layers may attach
/// typed values on the way in and read them further down the chain. The
/// router itself stores the matched route pattern there (see
/// [`Request::route_pattern`]).
#[derive(Debug)]
pub struct Request {
    pub(crate) head: Parts,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub fn from_parts(head: Parts, body: Bytes) -> Self {
        Self { head, body, params: HashMap::new() }
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.head.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.head.extensions }

    /// Header lookup. Values that are not visible ASCII are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter captured by the multiplexer.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    /// Values are percent-decoded: `/users/john%20doe` gives `Some("john doe")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The full pattern of the route that matched this request, e.g.
    /// `/api/users/{id}`. `None` if the request never went through a
    /// [`Router`](crate::Router).
    pub fn route_pattern(&self) -> Option<&str> {
        route_pattern::read(self)
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self::from_parts(head, body)
    }
}
