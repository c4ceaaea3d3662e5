//! Convenience re-exports for binaries registering RPC services.

pub use crate::gateway::{into_axum_router, serve_separate, RpcTransport};
pub use crate::health::{build_health_service, mark_not_serving};
pub use crate::introspect::{service, RpcConstructor, RpcService};
pub use crate::registry::{RouteFold, ServiceName};
pub use crate::scope::{GatewayOptions, HandlerOption, RpcScope, RpcScopeOptions};
pub use crate::transcoder::{EchoTranscoder, HttpBinding, Transcoder, TranscodingOptions};

#[cfg(feature = "reflection")]
pub use crate::reflection::build_reflection_services;
