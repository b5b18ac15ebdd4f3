//! Method-aware dispatch table.
//!
//! A thin shell over [`matchit`]: one radix tree per HTTP method, O(path
//! length) lookup. Pattern syntax, specificity rules, parameter capture and
//! conflict detection are all matchit's. This module only adds what a
//! request needs on top of a bare tree: method selection, `HEAD` falling back
//! to `GET`, percent-decoding captured parameters, and the 404 / 405 answers
//! when nothing matches.
//!
//! Matching runs on the raw request path, so `%2F` inside a segment never
//! splits it. Only the captured values are decoded.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use matchit::{InsertError, Router as Tree};
use percent_encoding::percent_decode_str;
use tracing::trace;

use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;

#[derive(Clone, Default)]
pub(crate) struct DispatchTable {
    trees: HashMap<Method, Tree<BoxedHandler>>,
}

/// Result of resolving a method + path against the table.
pub(crate) enum Lookup {
    Found {
        handler: BoxedHandler,
        params: HashMap<String, String>,
    },
    /// The path exists, but only under these methods.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl DispatchTable {
    pub(crate) fn insert(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
    ) -> Result<(), InsertError> {
        self.trees.entry(method).or_default().insert(pattern, handler)
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup {
        if let Some(found) = self.find(method, path) {
            return found;
        }
        if *method == Method::HEAD {
            if let Some(found) = self.find(&Method::GET, path) {
                return found;
            }
        }

        let mut allowed: Vec<Method> = self.trees.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();

        if allowed.is_empty() {
            trace!(%method, path, "no route matched");
            return Lookup::NotFound;
        }
        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        trace!(%method, path, ?allowed, "method not allowed");
        Lookup::MethodNotAllowed(allowed)
    }

    /// Resolves and runs `req` to completion.
    pub(crate) async fn dispatch(&self, req: Request) -> Response {
        let lookup = self.lookup(req.method(), req.path());
        lookup.respond(req).await
    }

    fn find(&self, method: &Method, path: &str) -> Option<Lookup> {
        let matched = self.trees.get(method)?.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), decode(v)))
            .collect();
        Some(Lookup::Found { handler, params })
    }
}

// Values that do not decode to UTF-8 are handed over as sent.
fn decode(raw: &str) -> String {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => Cow::into_owned(decoded),
        Err(_) => raw.to_owned(),
    }
}

impl Lookup {
    pub(crate) async fn respond(self, mut req: Request) -> Response {
        match self {
            Self::Found { handler, params } => {
                req.set_params(params);
                handler.call(req).await
            }
            Self::MethodNotAllowed(allowed) => {
                let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                let mut res = Response::status(StatusCode::METHOD_NOT_ALLOWED);
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    res.headers_mut().insert(ALLOW, value);
                }
                res
            }
            Self::NotFound => Response::status(StatusCode::NOT_FOUND),
        }
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("methods", &self.trees.keys().collect::<Vec<_>>())
            .finish()
    }
}
