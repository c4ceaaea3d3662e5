//! CORS middleware, built on `tower_http::cors::CorsLayer`.

use tower_http::cors::CorsLayer;

use crate::middleware::from_layer;
use crate::mux::Middleware;

/// Wrap a `tower_http` CORS layer as a [`Middleware`].
pub fn cors(layer: CorsLayer) -> Middleware {
    from_layer(layer)
}

/// A permissive CORS policy (any origin, any method, any header) — useful
/// for local development, not recommended for production.
pub fn permissive() -> Middleware {
    cors(CorsLayer::permissive())
}
