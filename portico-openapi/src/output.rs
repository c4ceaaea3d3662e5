//! Response encoding (spec.md §4.6.1's "the specialized encoder chooses
//! `text/plain` if `O` is a string type, else JSON").
//!
//! No blanket `impl<T: Serialize> OperationOutput for T` is offered: it
//! would collide with the specific `String` impl below (`String` is
//! itself `Serialize`). Handler output types implement this directly,
//! calling [`json_response`] for the common JSON case.

use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// What a handler's output type is responsible for: its OpenAPI-visible
/// media type, and how to turn a value into a response body.
pub trait OperationOutput {
    const MEDIA_TYPE: &'static str;

    fn respond(self) -> Response;
}

/// Shared JSON-encoding path for `OperationOutput` impls over `Serialize`
/// types.
pub fn json_response<T: Serialize>(value: &T) -> Response {
    axum::Json(value).into_response()
}

impl OperationOutput for String {
    const MEDIA_TYPE: &'static str = "text/plain";

    fn respond(self) -> Response {
        (http::StatusCode::OK, self).into_response()
    }
}

impl OperationOutput for () {
    const MEDIA_TYPE: &'static str = "application/json";

    fn respond(self) -> Response {
        http::StatusCode::NO_CONTENT.into_response()
    }
}
