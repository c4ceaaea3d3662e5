//! Convenience re-exports for binaries consuming `portico-core` directly.

pub use crate::config::{ConfigSource, MapConfigSource, ServerConfig};
pub use crate::error::PorticoError;
pub use crate::file::{CompletedFile, FileReader, FileReaderError};
pub use crate::form::{FormReader, FormReaderError, FormReaderOptions, NamingMode, Part};
pub use crate::hooks::{HookOptions, HookRegistry};
pub use crate::logging::init_tracing;
pub use crate::mux::{Middleware, Mux};
pub use crate::readiness::Readiness;
pub use crate::router::{BoxedHandler, Handler, PathValue};
pub use crate::server::{Server, ShutdownError};
pub use crate::map_error;

pub use axum::extract::Request;
pub use axum::response::{IntoResponse, Response};
pub use http::{Method, StatusCode};
