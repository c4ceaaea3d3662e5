//! Mux composer: prefix inheritance and scoped middleware over the
//! registration-time [`Router`] (spec §4.2).
//!
//! A `Mux` handle carries two kinds of middleware state: an *inherited*
//! sequence of buckets captured by value from ancestor [`Mux::group`] calls,
//! and at most one *volatile* bucket built by [`Mux::use_mw`] and consumed by
//! the next registration made through this exact handle. Every registration
//! folds the flattened inherited-then-volatile middleware list around the
//! terminal handler in reverse order, so the earliest-registered middleware
//! ends up outermost.

use std::future::Future;
use std::sync::{Arc, Mutex};

use axum::extract::Request;
use axum::response::Response;
use http::Method;

use crate::error::ConfigFatal;
use crate::router::{BoxedHandler, Handler, Router};

/// `Handler -> Handler` transform, matching the spec's glossary entry for
/// "Middleware" verbatim.
pub type Middleware = Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>;

type Bucket = Vec<Middleware>;

/// A composable handle over a shared [`Router`]. Cloning the inherited
/// buckets (rather than sharing them) is what makes sibling [`Mux::group`]
/// calls independent: middleware added to one child after the fact never
/// leaks into another.
#[derive(Clone)]
pub struct Mux {
    router: Arc<Mutex<Router>>,
    prefix: String,
    inherited: Vec<Bucket>,
    volatile: Option<Bucket>,
}

impl Mux {
    pub(crate) fn new(router: Arc<Mutex<Router>>) -> Self {
        Self {
            router,
            prefix: String::new(),
            inherited: Vec::new(),
            volatile: None,
        }
    }

    /// Append `middleware` to the handle's volatile bucket, creating one if
    /// none exists yet. Consumed by the next registration made through this
    /// handle.
    pub fn use_mw(&mut self, middleware: Middleware) -> &mut Self {
        match &mut self.volatile {
            Some(bucket) => bucket.push(middleware),
            None => self.volatile = Some(vec![middleware]),
        }
        self
    }

    /// Create a child handle under `prefix`, snapshotting the inherited
    /// buckets by value. If this handle has a pending volatile bucket, it is
    /// folded into the snapshot and cleared from this handle — the same
    /// "consumed by the next thing that happens through this handle" rule
    /// that registration follows.
    pub fn group(&mut self, prefix: &str) -> Mux {
        let mut inherited = self.inherited.clone();
        if let Some(bucket) = self.volatile.take() {
            inherited.push(bucket);
        }
        Mux {
            router: self.router.clone(),
            prefix: join_path(&self.prefix, prefix),
            inherited,
            volatile: None,
        }
    }

    fn wrap(&mut self, handler: BoxedHandler) -> BoxedHandler {
        let volatile = self.volatile.take();
        let mut flattened: Vec<Middleware> = self.inherited.iter().flatten().cloned().collect();
        if let Some(bucket) = volatile {
            flattened.extend(bucket);
        }
        flattened.into_iter().rev().fold(handler, |h, m| m(h))
    }

    /// Register a boxed handler directly. `method` of `None` matches any
    /// method (spec §4.1's "wildcard" registration).
    pub fn handle(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: BoxedHandler,
    ) -> Result<&mut Self, ConfigFatal> {
        let wrapped = self.wrap(handler);
        let full_pattern = join_path(&self.prefix, pattern);
        self.router
            .lock()
            .expect("router mutex poisoned")
            .register(method, &full_pattern, wrapped)?;
        Ok(self)
    }

    /// Register a plain async handler function at `method`/`pattern`.
    pub fn handle_fn<F, Fut>(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: F,
    ) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle(method, pattern, Arc::new(handler) as BoxedHandler)
    }

    pub fn get<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle_fn(Some(Method::GET), pattern, handler)
    }

    pub fn post<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle_fn(Some(Method::POST), pattern, handler)
    }

    pub fn put<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle_fn(Some(Method::PUT), pattern, handler)
    }

    pub fn delete<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle_fn(Some(Method::DELETE), pattern, handler)
    }

    pub fn patch<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle_fn(Some(Method::PATCH), pattern, handler)
    }

    pub fn head<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle_fn(Some(Method::HEAD), pattern, handler)
    }

    pub fn options<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle_fn(Some(Method::OPTIONS), pattern, handler)
    }

    /// Register a handler for every method at `pattern` (or, when `pattern`
    /// ends with `/`, its whole subtree).
    pub fn any<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, ConfigFatal>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle_fn(None, pattern, handler)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn router_handle(&self) -> Arc<Mutex<Router>> {
        self.router.clone()
    }
}

fn join_path(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
    let joined = format!("{prefix}/{pattern}");
    if joined.is_empty() {
        "/".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn header_mw(name: &'static str, value: &'static str) -> Middleware {
        Arc::new(move |inner: BoxedHandler| {
            Arc::new(move |req: Request| {
                let inner = inner.clone();
                Box::pin(async move {
                    let mut resp = inner.call(req).await;
                    resp.headers_mut().insert(name, value.parse().unwrap());
                    resp
                })
            }) as BoxedHandler
        })
    }

    fn root() -> Mux {
        Mux::new(Arc::new(Mutex::new(Router::new())))
    }

    #[tokio::test]
    async fn chained_use_wraps_outermost_first() {
        let mut mux = root();
        mux.use_mw(header_mw("x-a", "1"));
        mux.use_mw(header_mw("x-b", "2"));
        mux.get("/t", |_req| async { "ok".into_response() }).unwrap();

        let app = mux_into_app(mux);
        let resp = app
            .oneshot(Request::get("/t").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.headers().get("x-a").unwrap(), "1");
        assert_eq!(resp.headers().get("x-b").unwrap(), "2");
    }

    #[tokio::test]
    async fn volatile_bucket_does_not_leak_to_next_registration() {
        let mut mux = root();
        mux.use_mw(header_mw("x-once", "1"));
        mux.get("/a", |_req| async { "a".into_response() }).unwrap();
        mux.get("/b", |_req| async { "b".into_response() }).unwrap();

        let app = mux_into_app(mux);
        let resp_a = app
            .clone()
            .oneshot(Request::get("/a").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp_a.headers().get("x-once").unwrap(), "1");

        let resp_b = app
            .oneshot(Request::get("/b").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(resp_b.headers().get("x-once").is_none());
    }

    #[tokio::test]
    async fn group_inherits_snapshot_but_not_future_parent_middleware() {
        let mut mux = root();
        mux.use_mw(header_mw("x-inherited", "1"));
        let mut child = mux.group("/child");
        // Registered on the parent *after* the group was taken; must not
        // reach the child, since parent's volatile was already cleared.
        mux.get("/parent", |_req| async { "p".into_response() }).unwrap();
        child.get("/leaf", |_req| async { "leaf".into_response() }).unwrap();

        let app = mux_into_app(mux);
        let resp = app
            .oneshot(Request::get("/child/leaf").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.headers().get("x-inherited").unwrap(), "1");
    }

    #[tokio::test]
    async fn duplicate_registration_through_different_handles_still_conflicts() {
        let mut mux = root();
        let mut child = mux.group("/api");
        child.get("/users", |_req| async { "a".into_response() }).unwrap();
        let err = mux
            .get("/api/users", |_req| async { "b".into_response() })
            .unwrap_err();
        assert!(err.0.contains("/api/users"));
    }

    fn mux_into_app(mux: Mux) -> axum::Router {
        mux.router.lock().unwrap().build()
    }
}
