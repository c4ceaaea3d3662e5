//! Builds the final gRPC surface from everything every [`crate::scope::RpcScope`]
//! on a server contributed, and the two transport modes `spec.md` §4.5
//! implies: a separate gRPC port, or multiplexed onto the same port as HTTP.
//!
//! Grounded on `r2e_grpc::{GrpcTransport, build_grpc_router}` — the teacher's
//! own `build_grpc_router` left its multi-service merge unresolved (its
//! comment admits "tonic doesn't have a merge... we'll build services one at
//! a time"); `tonic::service::RoutesBuilder` (added since that code was
//! written) is the real fix, and is what [`build_router`] uses.

use portico_core::hooks::HookRegistry;
use tonic::service::Routes;

use crate::registry::{fold_routes, RouteFold, ServiceName};

/// How the RPC gateway's services are exposed relative to the HTTP server.
#[derive(Debug, Clone)]
pub enum RpcTransport {
    /// gRPC served on its own `tokio::net::TcpListener`, independent of the
    /// HTTP `Server`.
    SeparatePort(String),
    /// gRPC merged directly onto the HTTP `axum::Router` via
    /// `Routes::into_axum_router`, dispatched by path like any other route.
    Multiplexed,
}

/// Drain every `RouteFold` contributed so far and build the combined gRPC
/// [`Routes`], plus a non-destructive read of the fully qualified service
/// names currently live (for wiring health/reflection over the same set —
/// `snapshot`, not `drain`, since the scope's own deferred handler-extract
/// hook needs to read the same list before this call runs).
pub fn collect(hooks: &HookRegistry) -> (Routes, Vec<String>) {
    let folds: Vec<RouteFold> = hooks.drain();
    let names: Vec<String> = hooks.snapshot::<ServiceName>().into_iter().map(|n| n.0).collect();
    (fold_routes(folds), names)
}

/// Build an `axum::Router` serving every registered gRPC service, suitable
/// for `.merge()`-ing onto `Server::handler()`'s output (the `Multiplexed`
/// transport).
pub fn into_axum_router(hooks: &HookRegistry) -> axum::Router {
    let (routes, _names) = collect(hooks);
    routes.into_axum_router()
}

/// Serve every registered gRPC service on its own listener (the
/// `SeparatePort` transport), until `shutdown` resolves.
pub async fn serve_separate<F>(
    hooks: &HookRegistry,
    addr: &str,
    shutdown: F,
) -> Result<(), tonic::transport::Error>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let (routes, _names) = collect(hooks);
    let socket_addr: std::net::SocketAddr = addr.parse().expect("invalid gRPC listen address");
    tonic::transport::Server::builder()
        .add_routes(routes)
        .serve_with_shutdown(socket_addr, shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_from_empty_registry_yields_no_service_names() {
        let hooks = HookRegistry::new();
        let (_routes, names) = collect(&hooks);
        assert!(names.is_empty());
    }
}
