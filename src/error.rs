//! Unified error type.

use std::net::AddrParseError;

use http::Method;

/// The error type returned by layermux's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// setup failures (a rejected route, a bad bind address) and infrastructure
/// failures (binding to a port, accepting a connection).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`")]
    Addr {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    /// The dispatch table refused the registration. `source` is the
    /// multiplexer's own error, passed through untouched.
    #[error("cannot register route `{method} {pattern}`")]
    Route {
        method: Method,
        pattern: String,
        #[source]
        source: matchit::InsertError,
    },
}
