//! Reference middlewares the spec treats as external collaborators
//! "described only by their interface" — CORS and panic recovery — plus the
//! adapter that lets any body-preserving `tower::Layer` (CORS, response
//! header injection, `tower-http`'s tracing layer, ...) join a [`crate::mux::Mux`]'s
//! own middleware chain.

pub mod cors;
pub mod recover;
pub mod timeout;

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::Response;
use tower::{Layer, Service, ServiceExt};

use crate::mux::Middleware;
use crate::router::{BoxFuture, BoxedHandler, Handler};

/// Adapts a [`BoxedHandler`] into a `tower::Service`, so `tower`/`tower-http`
/// layers can wrap it.
#[derive(Clone)]
pub struct HandlerService(BoxedHandler);

impl Service<Request> for HandlerService {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let inner = self.0.clone();
        Box::pin(async move { Ok(inner.call(req).await) })
    }
}

/// Adapt any `tower::Layer` whose wrapped service leaves the response type
/// unchanged (true of `CorsLayer` and most header-only middlewares, which
/// only touch headers rather than the body) into a [`Middleware`].
pub fn from_layer<L>(layer: L) -> Middleware
where
    L: Layer<HandlerService> + Send + Sync + 'static,
    L::Service: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    <L::Service as Service<Request>>::Future: Send + 'static,
{
    Arc::new(move |inner: BoxedHandler| {
        let service = layer.layer(HandlerService(inner));
        Arc::new(move |req: Request| {
            let service = service.clone();
            Box::pin(async move {
                match service.oneshot(req).await {
                    Ok(resp) => resp,
                    Err(err) => match err {},
                }
            })
        }) as BoxedHandler
    })
}
