//! RPC scope for Portico.
//!
//! Mounts protobuf/gRPC services onto a [`portico_core::Server`] with the
//! same DX spec.md describes for the HTTP side: a registration façade
//! ([`scope::RpcScope`]) that introspects a constructor, aggregates
//! cross-scope state through the server's `HookRegistry`, and conditionally
//! wires up health ([`health`]), reflection ([`reflection`], feature-gated),
//! and REST transcoding ([`transcoder`]).
//!
//! # Example
//!
//! ```ignore
//! use portico_rpc::{introspect::service, scope::{RpcScope, RpcScopeOptions}};
//!
//! let mut scope = RpcScope::new(server.hooks(), RpcScopeOptions::default());
//! scope.register(GreeterImpl::default(), service("greeter", GreeterServer::new), &[]);
//!
//! let grpc = portico_rpc::gateway::into_axum_router(&server.hooks());
//! let app = server.handler().merge(grpc);
//! ```

pub mod gateway;
pub mod health;
pub mod introspect;
pub mod prelude;
pub mod registry;
pub mod scope;
pub mod transcoder;

#[cfg(feature = "reflection")]
pub mod reflection;

pub use introspect::{service, RpcConstructor, RpcService};
pub use registry::{RouteFold, ServiceName};
pub use scope::{GatewayOptions, HandlerOption, RpcScope, RpcScopeOptions};
pub use transcoder::{EchoTranscoder, HttpBinding, Transcoder, TranscodingOptions};

pub use tonic;
pub use prost;
