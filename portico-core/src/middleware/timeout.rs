//! Request timeout middleware.
//!
//! Implemented directly against [`crate::router::Handler`], the same way
//! [`crate::middleware::recover::catch_panic`] is, rather than via
//! `tower_http::timeout::TimeoutLayer` — that layer's rejection type isn't
//! `Infallible`, so it can't satisfy [`crate::middleware::from_layer`]'s
//! bound without an extra conversion step this crate has no other use for.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::mux::Middleware;
use crate::router::BoxedHandler;

/// Respond 504 Gateway Timeout if the wrapped handler doesn't finish within
/// `duration`. Bounds the whole request-response cycle a connection-level
/// server would otherwise split across `read_header_timeout`/`read_timeout`/
/// `write_timeout` — this crate's `Mux` only has a handle on the request at
/// the handler level, not the raw connection, so the three are applied here
/// as one combined ceiling.
pub fn request_timeout(duration: Duration) -> Middleware {
    Arc::new(move |inner: BoxedHandler| {
        Arc::new(move |req: Request| {
            let inner = inner.clone();
            Box::pin(async move {
                match tokio::time::timeout(duration, inner.call(req)).await {
                    Ok(resp) => resp,
                    Err(_elapsed) => {
                        (StatusCode::GATEWAY_TIMEOUT, "request timed out").into_response()
                    }
                }
            })
        }) as BoxedHandler
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::Request as HttpRequest;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn slow_handler_is_cut_off_with_504() {
        let slow: BoxedHandler = Arc::new(|_req: Request| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "too slow".into_response()
        });
        let wrapped = request_timeout(Duration::from_millis(5))(slow);
        let resp = wrapped.call(HttpRequest::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn fast_handler_is_unaffected() {
        let fast: BoxedHandler = Arc::new(|_req: Request| async { "ok".into_response() });
        let wrapped = request_timeout(Duration::from_secs(1))(fast);
        let resp = wrapped.call(HttpRequest::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }
}
