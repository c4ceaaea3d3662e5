//! Core runtime for Portico.
//!
//! Composes middleware, route dispatch, and lifecycle control around
//! [`axum::Router`]. A [`Server`] owns a tree of [`Mux`] handles (prefix
//! inheritance, scoped middleware) plus a [`HookRegistry`] that lets
//! independent subsystems (gRPC scopes, the typed-OpenAPI adapter, metrics,
//! profiling) contribute routes at a single deterministic moment: first
//! handler extraction.
//!
//! # Example
//!
//! ```ignore
//! use portico_core::{Server, ServerConfig};
//!
//! #[derive(Clone)]
//! struct AppState;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new("demo", AppState, ServerConfig::default())
//!         .get("/ping", |_req| async { "pong" });
//!
//!     server.serve_context(tokio::signal::ctrl_c(), "0.0.0.0:8080").await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod form;
pub mod hooks;
pub mod logging;
pub mod middleware;
pub mod mux;
pub mod prelude;
pub mod readiness;
pub mod router;
pub mod server;

pub use config::{ConfigSource, MapConfigSource, ServerConfig};
pub use error::PorticoError;
pub use file::{CompletedFile, FileReader, FileReaderError};
pub use form::{FormReader, FormReaderError, FormReaderOptions, NamingMode, Part};
pub use hooks::{HookOptions, HookRegistry};
pub use logging::init_tracing;
pub use mux::{Middleware, Mux};
pub use readiness::Readiness;
pub use router::{BoxedHandler, Handler, PathValue};
pub use server::{Server, ShutdownError};

pub use axum;
pub use http;
pub use tower;
