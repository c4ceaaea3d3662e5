//! Typed-OpenAPI adapter for Portico.
//!
//! Turns a tagged input type plus a plain async function into an HTTP
//! handler and an OpenAPI operation descriptor, the way `r2e_openapi`
//! turns annotated routes into a spec document — except the binding plan
//! is built through ordinary builder calls ([`binding::Binding`]) instead
//! of a derive macro, since this crate carries no proc-macro companion.
//!
//! # Example
//!
//! ```ignore
//! use portico_openapi::prelude::*;
//!
//! #[derive(Default)]
//! struct GreetInput { name: String }
//!
//! let mut scope = OpenApiScope::new(server.hooks(), DocumentOptions::new("Demo API", "/docs"));
//! scope.register(
//!     &mut server.group(""),
//!     http::Method::GET,
//!     "/greet/{name}",
//!     Binding::<GreetInput>::new().path("name", FieldOptions::new().required(), |i, v| i.name = v),
//!     |input: GreetInput| async move { format!("hello {}", input.name) },
//!     OperationOptions::new().summary("Greet someone"),
//! ).unwrap();
//! ```

pub mod binding;
pub mod document;
pub mod operation;
pub mod output;
pub mod prelude;
pub mod register;

pub use binding::{Binding, FieldOptions, Location, ParameterMeta};
pub use document::{docs_ui_html, render_bytes, DocumentFormat, DocumentOptions};
pub use operation::{Operation, OperationOptions};
pub use output::{json_response, OperationOutput};
pub use register::OpenApiScope;

pub use schemars;
