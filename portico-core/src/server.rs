//! Server core: owns the root [`Mux`], the [`HookRegistry`], and the
//! graceful shutdown sequence (spec §4.3, §4.3.1).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::sync::CancellationToken;

use crate::config::{default_readiness_handler, ServerConfig};
use crate::hooks::HookRegistry;
use crate::mux::{Middleware, Mux};
use crate::readiness::Readiness;
use crate::router::Router;

/// A named HTTP service: application state, a composable route tree, a
/// hook registry other subsystems contribute routes through, and a
/// lifecycle (readiness flag, base cancellation context, graceful
/// shutdown).
pub struct Server<S> {
    name: String,
    state: S,
    config: ServerConfig,
    readiness: Readiness,
    root: Mux,
    hooks: Arc<HookRegistry>,
    base_context: CancellationToken,
}

impl<S> Server<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, state: S, config: ServerConfig) -> Self {
        let router = Arc::new(std::sync::Mutex::new(Router::new()));
        let hooks = Arc::new(HookRegistry::new());
        let server = Self {
            name: name.into(),
            state,
            config,
            readiness: Readiness::new(),
            root: Mux::new(router),
            hooks,
            base_context: CancellationToken::new(),
        };

        if server.config.reveal_routes {
            let name = server.name.clone();
            let readiness_path = server.config.readiness_path.clone();
            server.hooks.on_startup(move |mux| {
                let router = mux.router_handle();
                let table = router.lock().expect("router mutex poisoned");
                for pattern in table.patterns() {
                    tracing::info!(server = %name, route = pattern, "registered route");
                }
                tracing::info!(server = %name, route = %readiness_path, "registered route (readiness)");
            });
        }

        server
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Cooperative cancellation handle, cancelled once the graceful
    /// shutdown's cleanup callbacks have run. Background workers started
    /// alongside the server should select on this to stop accepting new
    /// work.
    pub fn base_context(&self) -> CancellationToken {
        self.base_context.clone()
    }

    /// Shared hook registry, for subsystems (an RPC scope, the typed-OpenAPI
    /// adapter) that need to aggregate values across registration call sites
    /// or contribute routes at handler extraction.
    pub fn hooks(&self) -> Arc<HookRegistry> {
        self.hooks.clone()
    }

    /// Open a child scope rooted at `prefix`, inheriting the current
    /// middleware chain by value.
    pub fn group(&mut self, prefix: &str) -> Mux {
        self.root.group(prefix)
    }

    pub fn use_mw(mut self, middleware: Middleware) -> Self {
        self.root.use_mw(middleware);
        self
    }

    pub fn get<F, Fut>(mut self, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.root
            .get(pattern, handler)
            .unwrap_or_else(|err| panic!("{err}"));
        self
    }

    pub fn post<F, Fut>(mut self, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.root
            .post(pattern, handler)
            .unwrap_or_else(|err| panic!("{err}"));
        self
    }

    pub fn put<F, Fut>(mut self, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.root
            .put(pattern, handler)
            .unwrap_or_else(|err| panic!("{err}"));
        self
    }

    pub fn delete<F, Fut>(mut self, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.root
            .delete(pattern, handler)
            .unwrap_or_else(|err| panic!("{err}"));
        self
    }

    pub fn patch<F, Fut>(mut self, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.root
            .patch(pattern, handler)
            .unwrap_or_else(|err| panic!("{err}"));
        self
    }

    pub fn any<F, Fut>(mut self, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.root
            .any(pattern, handler)
            .unwrap_or_else(|err| panic!("{err}"));
        self
    }

    /// Run handler-extract hooks against the root mux and build a fresh
    /// `axum::Router`, merging in the readiness endpoint. Safe to call more
    /// than once; every call re-runs non-`once` hooks and rebuilds the
    /// route table from its current state.
    pub fn handler(&self) -> axum::Router {
        let mut mux = self.root.clone();
        self.hooks.run_extract_hooks(&mut mux);

        let router_handle = self.root.router_handle();
        let table = router_handle.lock().expect("router mutex poisoned");
        let built = table.build();
        drop(table);

        let readiness_route = match &self.config.readiness_handler {
            Some(factory) => factory(self.readiness.clone()),
            None => default_readiness_handler(self.readiness.clone()),
        };
        let router = built.route(&self.config.readiness_path, readiness_route);

        let request_timeout =
            self.config.read_header_timeout + self.config.read_timeout + self.config.write_timeout;
        router.layer(axum::middleware::from_fn(move |req: Request, next: axum::middleware::Next| {
            let request_timeout = request_timeout;
            async move {
                match tokio::time::timeout(request_timeout, next.run(req)).await {
                    Ok(resp) => resp,
                    Err(_elapsed) => {
                        (StatusCode::GATEWAY_TIMEOUT, "request timed out").into_response()
                    }
                }
            }
        }))
    }

    /// Serve on `addr` until `shutdown_signal` resolves (merged with an
    /// internal ctrl-c/SIGTERM listener per spec §4.3 — a caller that never
    /// fires its own signal still gets interrupt-triggered shutdown), then
    /// run the graceful shutdown sequence described in spec §4.3.1:
    ///
    /// 1. mark the readiness flag unhealthy
    /// 2. wait `readiness_drain_delay` for load balancers to notice
    /// 3. stop accepting new connections and wait up to `shutdown_period`
    ///    for in-flight requests to finish
    /// 4. run cleanup callbacks
    /// 5. cancel the base context
    /// 6. on failure, wait `hard_shutdown_period` and return an error
    ///
    /// Runs every registered startup hook, in registration order, once the
    /// route table built by [`Server::handler`] is final.
    pub async fn serve_context<F>(
        mut self,
        shutdown_signal: F,
        addr: impl ToSocketAddrs,
    ) -> Result<(), ShutdownError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ShutdownError(format!("bind failed: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ShutdownError(format!("local_addr failed: {e}")))?;
        tracing::info!(server = %self.name, addr = %local_addr, "listening");

        let app = self.handler();
        self.hooks.run_startup_hooks(&self.root);

        let readiness = self.readiness.clone();
        let drain_delay = self.config.readiness_drain_delay;
        let shutdown_period = self.config.shutdown_period;
        let hard_shutdown_period = self.config.hard_shutdown_period;
        let cleanup_callbacks = std::mem::take(&mut self.config.cleanup_callbacks);
        let base_context = self.base_context.clone();

        let (triggered_tx, triggered_rx) = tokio::sync::oneshot::channel::<()>();
        let trigger = async move {
            tokio::select! {
                _ = shutdown_signal => {},
                _ = process_signal() => {},
            }
            readiness.mark_shutting_down();
            tokio::time::sleep(drain_delay).await;
            let _ = triggered_tx.send(());
        };

        let serve_handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(trigger)
                .await
        });

        let _ = triggered_rx.await;

        let result = tokio::time::timeout(shutdown_period, serve_handle).await;

        for cb in cleanup_callbacks {
            cb();
        }
        base_context.cancel();

        match result {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ShutdownError(format!("server error: {e}"))),
            Ok(Err(join_err)) => Err(ShutdownError(format!("server task panicked: {join_err}"))),
            Err(_elapsed) => {
                tokio::time::sleep(hard_shutdown_period).await;
                Err(ShutdownError(
                    "graceful shutdown exceeded shutdown_period".to_string(),
                ))
            }
        }
    }
}

/// Wait for ctrl-c or, on Unix, SIGTERM — merged into every
/// [`Server::serve_context`] call's shutdown trigger regardless of what the
/// caller passes in.
async fn process_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Graceful shutdown failed to complete within its configured bounds.
#[derive(Debug, Clone)]
pub struct ShutdownError(pub String);

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shutdown error: {}", self.0)
    }
}

impl std::error::Error for ShutdownError {}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::IntoResponse;
    use http::{Request as HttpRequest, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[derive(Clone)]
    struct Ctx;

    #[tokio::test]
    async fn registered_route_is_reachable() {
        let server = Server::new("test", Ctx, ServerConfig::default())
            .get("/ping", |_req| async { "pong".into_response() });
        let app = server.handler();
        let resp = app
            .oneshot(HttpRequest::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn readiness_endpoint_reflects_shutdown_state() {
        let server = Server::new("test", Ctx, ServerConfig::default());
        let readiness = server.readiness();
        let app = server.handler();

        let resp = app
            .clone()
            .oneshot(HttpRequest::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        readiness.mark_shutting_down();
        let resp = app
            .oneshot(HttpRequest::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn serve_context_runs_cleanup_and_returns_ok_on_immediate_shutdown() {
        let cleaned_up = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let cleaned_up_clone = cleaned_up.clone();
        let config = ServerConfig::default()
            .with_readiness_drain_delay(Duration::from_millis(1))
            .add_cleanup_callback(move || {
                cleaned_up_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            });
        let server = Server::new("test", Ctx, config);
        let result = server.serve_context(async {}, "127.0.0.1:0").await;
        assert!(result.is_ok());
        assert!(cleaned_up.load(std::sync::atomic::Ordering::SeqCst));
    }
}
