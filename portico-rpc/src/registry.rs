//! The cross-scope aggregators backing `spec.md` §4.5's "shared service-name
//! list".
//!
//! Multiple [`crate::scope::RpcScope`] handles on one `Server` need to agree
//! on one service-name list (for reflection/health) and one set of routed
//! services (for the gRPC gateway router), even though each scope only knows
//! about the services registered through it. Rather than a bespoke registry
//! type, both aggregators are ordinary `portico_core::HookRegistry` slots —
//! the same `push`/`drain` mechanism `r2e_core::meta::MetaRegistry` uses for
//! its append-only metadata lists, generalized per
//! `portico_core::hooks::HookRegistry`.

use tonic::service::{Routes, RoutesBuilder};

/// One fully-qualified service name contributed by a `Register` call,
/// pushed under a dedicated aggregator key.
#[derive(Debug, Clone)]
pub struct ServiceName(pub String);

/// A boxed step that folds one more routed service into the gateway's
/// accumulated [`RoutesBuilder`]. Stored instead of the concrete service
/// type so scopes registering distinct `Impl`/`Svc` types can share one
/// `Vec` — each closure captures its own monomorphic `add_service` call.
pub struct RouteFold(pub Box<dyn FnOnce(RoutesBuilder) -> RoutesBuilder + Send + Sync>);

impl RouteFold {
    pub fn new(f: impl FnOnce(RoutesBuilder) -> RoutesBuilder + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }
}

/// Fold every contributed [`RouteFold`] into one [`Routes`] value, in
/// registration order.
pub fn fold_routes(folds: Vec<RouteFold>) -> Routes {
    let builder = folds
        .into_iter()
        .fold(RoutesBuilder::default(), |acc, step| (step.0)(acc));
    builder.routes()
}
