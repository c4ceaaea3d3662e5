//! Configuration for the `Server` lifecycle, plus the opaque key/value
//! `ConfigSource` contract the spec treats dependency-injection and config
//! loading frameworks as satisfying (spec §1: "supplies values to the
//! handler builder... spec treats it as an opaque key/value service").
//!
//! `portico-core` does not ship a dependency-injection container — that is
//! explicitly out of scope. It does ship a minimal YAML+env-overlay
//! `ConfigSource` implementation in the style of `r2e_core::config::R2eConfig`,
//! trimmed down to the opaque-lookup surface the spec actually needs.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use axum::response::IntoResponse;
use http::StatusCode;

use crate::readiness::Readiness;

/// Opaque key/value lookup, satisfied by whatever configuration/DI system a
/// downstream binary chooses. The core never constructs one on its own
/// behalf beyond the bundled [`MapConfigSource`].
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<&str>;

    fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }
}

/// A `ConfigSource` backed by an in-memory map, loaded from YAML files and
/// overlaid with environment variables — the same resolution order as
/// `r2e_core::config::R2eConfig::load`, minus typed sections and secret
/// placeholder resolution (out of this crate's scope).
#[derive(Debug, Clone, Default)]
pub struct MapConfigSource {
    values: HashMap<String, String>,
}

impl MapConfigSource {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a YAML document's top-level scalar keys, then overlay process
    /// environment variables (which always win).
    pub fn load(yaml_path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let mut values = HashMap::new();
        if let Ok(text) = std::fs::read_to_string(yaml_path) {
            let doc: serde_yaml::Value =
                serde_yaml::from_str(&text).map_err(|e| ConfigLoadError(e.to_string()))?;
            flatten_yaml("", &doc, &mut values);
        }
        for (k, v) in std::env::vars() {
            values.insert(k.to_lowercase().replace('_', "."), v);
        }
        Ok(Self { values })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }
}

fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let Some(k) = k.as_str() else { continue };
                let key = if prefix.is_empty() {
                    k.to_string()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_yaml(&key, v, out);
            }
        }
        serde_yaml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_yaml::Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        serde_yaml::Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        _ => {}
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoadError(pub String);

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config load error: {}", self.0)
    }
}

impl std::error::Error for ConfigLoadError {}

/// Protocols a `Server` may accept connections over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http1,
    Http2,
}

/// A factory for the readiness handler, given a handle to the shutdown flag.
/// Defaults to 200 when not shutting down, 503 otherwise, per spec §4.3.
pub type ReadinessHandlerFactory = std::sync::Arc<
    dyn Fn(Readiness) -> axum::routing::MethodRouter + Send + Sync,
>;

/// A cleanup callback invoked during the graceful shutdown sequence
/// (spec §4.3.1 step 4), before the base context is cancelled.
pub type CleanupCallback = Box<dyn FnOnce() + Send>;

/// Server-level configuration (spec §6, "Configuration options (core,
/// recognized)").
pub struct ServerConfig {
    /// Duration new-unhealthy readiness is held before shutdown begins
    /// draining in-flight requests, so load balancers observe it. Default 5s.
    pub readiness_drain_delay: Duration,
    /// Bound on graceful shutdown waiting for in-flight requests. Default 15s.
    pub shutdown_period: Duration,
    /// Bound on the tail wait after a failed graceful shutdown. Default 3s.
    pub hard_shutdown_period: Duration,
    /// Read-header timeout for the default HTTP server. Default 15s.
    pub read_header_timeout: Duration,
    /// Read timeout for the default HTTP server. Default 60s.
    pub read_timeout: Duration,
    /// Write timeout for the default HTTP server. Default 60s.
    pub write_timeout: Duration,
    /// Idle timeout for the default HTTP server. Default 300s.
    pub idle_timeout: Duration,
    /// Protocols the server accepts.
    pub server_protocols: Vec<Protocol>,
    /// Path the readiness endpoint is installed at. Default `/healthz`.
    pub readiness_path: String,
    /// Override factory for the readiness handler.
    pub readiness_handler: Option<ReadinessHandlerFactory>,
    /// When true, registered routes are logged at startup.
    pub reveal_routes: bool,
    /// Cleanup callbacks run during shutdown, in registration order.
    pub cleanup_callbacks: Vec<CleanupCallback>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("readiness_drain_delay", &self.readiness_drain_delay)
            .field("shutdown_period", &self.shutdown_period)
            .field("hard_shutdown_period", &self.hard_shutdown_period)
            .field("readiness_path", &self.readiness_path)
            .field("reveal_routes", &self.reveal_routes)
            .finish_non_exhaustive()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            readiness_drain_delay: Duration::from_secs(5),
            shutdown_period: Duration::from_secs(15),
            hard_shutdown_period: Duration::from_secs(3),
            read_header_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(300),
            server_protocols: vec![Protocol::Http1, Protocol::Http2],
            readiness_path: "/healthz".to_string(),
            readiness_handler: None,
            reveal_routes: false,
            cleanup_callbacks: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn with_readiness_drain_delay(mut self, d: Duration) -> Self {
        self.readiness_drain_delay = d;
        self
    }

    pub fn with_shutdown_period(mut self, d: Duration) -> Self {
        self.shutdown_period = d;
        self
    }

    pub fn with_hard_shutdown_period(mut self, d: Duration) -> Self {
        self.hard_shutdown_period = d;
        self
    }

    pub fn with_readiness_path(mut self, path: impl Into<String>) -> Self {
        self.readiness_path = path.into();
        self
    }

    pub fn with_reveal_routes(mut self, reveal: bool) -> Self {
        self.reveal_routes = reveal;
        self
    }

    pub fn with_read_header_timeout(mut self, d: Duration) -> Self {
        self.read_header_timeout = d;
        self
    }

    pub fn with_read_timeout(mut self, d: Duration) -> Self {
        self.read_timeout = d;
        self
    }

    pub fn with_write_timeout(mut self, d: Duration) -> Self {
        self.write_timeout = d;
        self
    }

    pub fn with_idle_timeout(mut self, d: Duration) -> Self {
        self.idle_timeout = d;
        self
    }

    pub fn with_server_protocols(mut self, protocols: Vec<Protocol>) -> Self {
        self.server_protocols = protocols;
        self
    }

    pub fn add_cleanup_callback(mut self, cb: impl FnOnce() + Send + 'static) -> Self {
        self.cleanup_callbacks.push(Box::new(cb));
        self
    }
}

/// Default readiness handler: 200 OK iff not shutting down, else 503.
pub(crate) fn default_readiness_handler(readiness: Readiness) -> axum::routing::MethodRouter {
    axum::routing::get(move || {
        let readiness = readiness.clone();
        async move {
            if readiness.is_shutting_down() {
                (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response()
            } else {
                (StatusCode::OK, "ok").into_response()
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_match_spec() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.readiness_drain_delay, Duration::from_secs(5));
        assert_eq!(cfg.shutdown_period, Duration::from_secs(15));
        assert_eq!(cfg.hard_shutdown_period, Duration::from_secs(3));
        assert_eq!(cfg.read_header_timeout, Duration::from_secs(15));
        assert_eq!(cfg.read_timeout, Duration::from_secs(60));
        assert_eq!(cfg.write_timeout, Duration::from_secs(60));
        assert_eq!(cfg.idle_timeout, Duration::from_secs(300));
        assert_eq!(cfg.readiness_path, "/healthz");
    }

    #[test]
    fn timeout_builders_override_defaults() {
        let cfg = ServerConfig::default()
            .with_read_header_timeout(Duration::from_secs(1))
            .with_read_timeout(Duration::from_secs(2))
            .with_write_timeout(Duration::from_secs(3))
            .with_idle_timeout(Duration::from_secs(4))
            .with_server_protocols(vec![Protocol::Http1]);
        assert_eq!(cfg.read_header_timeout, Duration::from_secs(1));
        assert_eq!(cfg.read_timeout, Duration::from_secs(2));
        assert_eq!(cfg.write_timeout, Duration::from_secs(3));
        assert_eq!(cfg.idle_timeout, Duration::from_secs(4));
        assert_eq!(cfg.server_protocols, vec![Protocol::Http1]);
    }

    #[test]
    fn map_config_source_env_overlays_file() {
        let mut src = MapConfigSource::empty();
        src.set("app.name", "demo");
        assert_eq!(src.get("app.name"), Some("demo"));
        assert_eq!(src.get_or("app.missing", "fallback"), "fallback");
    }
}
