//! Constructor introspection for RPC service registration.
//!
//! `spec.md` §4.5.1 describes registration as reflecting over a constructor's
//! parameter/return shape at runtime. In a generic-typed language that
//! reflection is unnecessary: the constructor's *type* already states the
//! contract. [`RpcConstructor`] encodes it directly — "accepts an
//! implementation value, returns a `(pattern, Routes)` pair" — and
//! [`service`] is the combinator that turns a tonic-generated
//! `FooServer::new` function into one.

use tonic::body::Body as TonicBody;
use tonic::server::NamedService;
use tonic::service::RoutesBuilder;

use crate::registry::RouteFold;
use crate::scope::HandlerOption;

/// A tonic-generated server type: `Clone`able, nameable, and callable as an
/// HTTP/2 service over tonic's body type. Every `*_server::FooServer<T>`
/// tonic's codegen emits satisfies this.
pub trait RpcService:
    NamedService
    + tower::Service<
        http::Request<TonicBody>,
        Response = http::Response<TonicBody>,
        Error = std::convert::Infallible,
    > + Clone
    + Send
    + Sync
    + 'static
where
    <Self as tower::Service<http::Request<TonicBody>>>::Future: Send + 'static,
{
}

impl<T> RpcService for T
where
    T: NamedService
        + tower::Service<
            http::Request<TonicBody>,
            Response = http::Response<TonicBody>,
            Error = std::convert::Infallible,
        > + Clone
        + Send
        + Sync
        + 'static,
    <T as tower::Service<http::Request<TonicBody>>>::Future: Send + 'static,
{
}

/// The introspected shape a registration constructor must have: given an
/// implementation value and the per-handler options `RpcScope::register`
/// was called with, produce the pattern it should be mounted under and a
/// step that folds the routed service into the server-shared gateway
/// router.
///
/// Implemented for any `Fn(Impl, &[HandlerOption]) -> (&'static str, RouteFold)`
/// — what [`service`] produces from a tonic-generated constructor plus a
/// mount pattern.
pub trait RpcConstructor<Impl> {
    fn construct(&self, imp: Impl, opts: &[HandlerOption]) -> (&'static str, RouteFold);
}

impl<Impl, F> RpcConstructor<Impl> for F
where
    F: Fn(Impl, &[HandlerOption]) -> (&'static str, RouteFold),
{
    fn construct(&self, imp: Impl, opts: &[HandlerOption]) -> (&'static str, RouteFold) {
        (self)(imp, opts)
    }
}

/// Wrap a tonic-generated constructor (`FooServer::new`, `BarServer::new`,
/// ...) and a mount pattern into the `(pattern, RouteFold)` shape
/// [`RpcConstructor`] expects.
///
/// ```ignore
/// scope.register(GreeterImpl::default(), service("greeter", GreeterServer::new), &[]);
/// ```
pub fn service<Impl, Svc>(
    pattern: &'static str,
    ctor: impl Fn(Impl) -> Svc + Send + Sync + 'static,
) -> impl Fn(Impl, &[HandlerOption]) -> (&'static str, RouteFold)
where
    Svc: RpcService,
    <Svc as tower::Service<http::Request<TonicBody>>>::Future: Send + 'static,
{
    move |imp, opts| {
        let svc = ctor(imp);
        if !opts.is_empty() {
            tracing::debug!(pattern = %pattern, count = opts.len(), "handler options applied to service");
        }
        (
            pattern,
            RouteFold::new(move |b: RoutesBuilder| {
                let mut b = b;
                b.add_service(svc);
                b
            }),
        )
    }
}
