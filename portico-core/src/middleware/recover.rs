//! Panic recovery middleware.
//!
//! Implemented directly against [`crate::router::Handler`] rather than via
//! `tower_http::catch_panic`, which wraps the response body in its own type
//! and would otherwise force every middleware downstream of it to stop
//! assuming `axum::body::Body`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use http::StatusCode;

use crate::mux::Middleware;
use crate::router::BoxedHandler;

/// Recover from a panicking handler, responding 500 instead of letting the
/// panic unwind into the connection task.
pub fn catch_panic() -> Middleware {
    Arc::new(|inner: BoxedHandler| {
        Arc::new(move |req: Request| {
            let inner = inner.clone();
            Box::pin(async move {
                match AssertUnwindSafe(inner.call(req)).catch_unwind().await {
                    Ok(resp) => resp,
                    Err(payload) => {
                        tracing::error!(panic = %panic_message(&*payload), "handler panicked");
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
                    }
                }
            })
        }) as BoxedHandler
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::Request as HttpRequest;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn panicking_handler_becomes_500() {
        let panics: BoxedHandler = Arc::new(|_req: Request| async { panic!("boom") });
        let wrapped = catch_panic()(panics);
        let resp = wrapped
            .call(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let _ = resp.into_body().collect().await.unwrap().to_bytes();
    }
}
