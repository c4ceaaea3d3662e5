//! Health endpoint (`spec.md` §4.5, §6): "a health endpoint bound to a
//! static health checker over the current shared service-name list."
//!
//! Thin wrapper over `tonic_health`, which already ships the
//! `grpc.health.v1.Health` service tonic clients expect.

use tonic_health::pb::health_server::HealthServer;
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;

/// Build the health service plus a reporter used to flip services between
/// `SERVING`/`NOT_SERVING`, and mark every currently known service name
/// serving by default.
///
/// Synchronous so it can run from a handler-extract hook (`FnMut(&mut Mux)`,
/// no `.await` available there): each name's status update is fired off on
/// its own spawned task instead of awaited inline.
pub fn build_health_service(
    service_names: &[String],
) -> (HealthReporter, HealthServer<impl tonic_health::server::HealthService>) {
    let (reporter, service) = tonic_health::server::health_reporter();
    for name in service_names {
        let reporter = reporter.clone();
        let name = name.clone();
        tokio::spawn(async move {
            reporter.set_service_status(name, ServingStatus::Serving).await;
        });
    }
    (reporter, service)
}

/// Mark a single service not-serving (readiness/shutdown integration).
pub async fn mark_not_serving(reporter: &HealthReporter, service_name: &str) {
    reporter
        .set_service_status(service_name.to_string(), ServingStatus::NotServing)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_health_service_marks_known_names_serving() {
        let (reporter, _service) = build_health_service(&["greeter.v1.Greeter".to_string()]);
        mark_not_serving(&reporter, "greeter.v1.Greeter").await;
    }
}
