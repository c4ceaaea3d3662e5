//! Server reflection (`spec.md` §4.5, §6): "two reflection endpoints (v1 and
//! v1alpha variants) bound to a static reflector over the current shared
//! service-name list."
//!
//! Gated behind the `reflection` feature, the same way `r2e-grpc` gates its
//! own reflection support — descriptor data plus the reflection service
//! itself are both sizeable dependencies (`prost-reflect`, `tonic-reflection`)
//! not every deployment wants to carry.

use prost_reflect::DescriptorPool;
use tonic_reflection::pb::v1::server_reflection_server::ServerReflectionServer;
use tonic_reflection::pb::v1alpha::server_reflection_server::ServerReflectionServer as ServerReflectionServerV1Alpha;

/// Build both reflection services from a compiled `FileDescriptorSet` (the
/// bytes `tonic_build::configure().file_descriptor_set_path(...)` emits at
/// build time) plus the list of fully qualified service names this server
/// currently exposes. Returned as `impl Trait` pairs — tonic's reflection
/// builder types aren't named in our public API, only their
/// `NamedService`-compatible shape is.
pub fn build_reflection_services(
    descriptor_set: &[u8],
    service_names: &[String],
) -> Result<
    (
        ServerReflectionServer<impl tonic_reflection::server::v1::ServerReflection>,
        ServerReflectionServerV1Alpha<impl tonic_reflection::server::v1alpha::ServerReflection>,
    ),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let pool = DescriptorPool::decode(descriptor_set)?;

    let mut builder = tonic_reflection::server::Builder::configure()
        .register_file_descriptor_set(pool.file_descriptor_set());
    for name in service_names {
        builder = builder.with_service_name(name.clone());
    }

    let v1 = builder.clone().build_v1()?;
    let v1alpha = builder.build_v1alpha()?;

    Ok((v1, v1alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn building_reflection_services_from_empty_descriptor_set_errors_cleanly() {
        let result = build_reflection_services(&[], &["greeter.v1.Greeter".to_string()]);
        assert!(result.is_err());
    }
}
