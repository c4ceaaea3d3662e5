//! The error taxonomy from the spec's "Error handling design": configuration
//! errors are fatal at registration, decode/handler errors stay local to the
//! request, and shutdown errors are returned from [`crate::Server::serve_context`].

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

/// A registration-time error: bad constructor signature, unresolved
/// descriptor, duplicate route, unsupported OpenAPI version, transcoder
/// build failure. Always fatal — callers are expected to `panic!`/`expect`
/// on it during startup, mirroring `r2e_core::AppBuilder::build_state`'s
/// `expect("Failed to resolve bean dependency graph")`.
#[derive(Debug, Clone)]
pub struct ConfigFatal(pub String);

impl std::fmt::Display for ConfigFatal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigFatal {}

/// Top-level error type surfaced to handlers and, where it crosses the HTTP
/// boundary, turned into a response.
pub enum PorticoError {
    /// Malformed body, parameter parse failure, file size exceeded, missing
    /// multipart boundary, mismatched message type.
    Decode(String),
    /// Arbitrary application-level failure, propagated unchanged.
    Handler(Box<dyn std::error::Error + Send + Sync>),
    /// Graceful shutdown timed out (see [`crate::server::ShutdownError`]).
    Shutdown(String),
    /// An explicit status + JSON body, for handlers that want full control.
    Custom {
        status: StatusCode,
        body: serde_json::Value,
    },
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for PorticoError {
    fn into_response(self) -> Response {
        match self {
            PorticoError::Decode(msg) => error_response(StatusCode::BAD_REQUEST, msg),
            PorticoError::Handler(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            PorticoError::Shutdown(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
            PorticoError::Custom { status, body } => (status, Json(body)).into_response(),
        }
    }
}

impl std::fmt::Debug for PorticoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PorticoError::Decode(msg) => write!(f, "Decode({msg})"),
            PorticoError::Handler(err) => write!(f, "Handler({err})"),
            PorticoError::Shutdown(msg) => write!(f, "Shutdown({msg})"),
            PorticoError::Custom { status, body } => write!(f, "Custom({status}, {body})"),
        }
    }
}

impl std::fmt::Display for PorticoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Debug>::fmt(self, f)
    }
}

impl std::error::Error for PorticoError {}

impl From<std::io::Error> for PorticoError {
    fn from(err: std::io::Error) -> Self {
        PorticoError::Handler(Box::new(err))
    }
}

/// Generate `From<E> for PorticoError` implementations that map error types
/// onto the `Handler` variant.
///
/// ```ignore
/// portico_core::map_error! {
///     sqlx::Error,
///     std::num::ParseIntError,
/// }
/// ```
#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::PorticoError {
                fn from(err: $err_ty) -> Self {
                    $crate::PorticoError::Handler(Box::new(err))
                }
            }
        )*
    };
}
