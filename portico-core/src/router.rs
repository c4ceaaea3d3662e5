//! Exact-match method+pattern router (spec §4.1).
//!
//! Patterns follow axum's own syntax (static segments, `{name}` captures).
//! Dispatch is exact: a method+path match wins; a path match with no
//! method match returns 405; no path match at all falls through to axum's
//! own 404 fallback. No regex, no backtracking — this module is a thin
//! per-pattern method table sitting in front of `axum::Router`'s matcher.
//!
//! Handlers carry no generic application-state parameter (spec §3's data
//! model is plain `Request -> Response`); a binary reaches its own state by
//! closing over it when building a handler closure, the same way `net/http`
//! handlers close over dependencies rather than receiving them as an
//! argument.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use http::{Method, StatusCode};

use crate::error::ConfigFatal;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A terminal or wrapped request handler — the Rust analog of Go's
/// `http.Handler`, and the thing the spec's `Handler → Handler` middleware
/// transforms operate on.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture<Response>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Response> {
        Box::pin((self)(req))
    }
}

pub type BoxedHandler = Arc<dyn Handler>;

/// Path parameters captured for the current request, exposed the way
/// `net/http`'s `r.PathValue(name)` is: an owned snapshot of axum's own
/// `RawPathParams`, stashed in request extensions so it survives the trip
/// through our own middleware chain (which, unlike axum extractors, doesn't
/// thread typed parameters through function signatures).
#[derive(Clone, Default)]
pub struct PathValue(Arc<Vec<(String, String)>>);

impl PathValue {
    fn from_raw(raw: &axum::extract::RawPathParams) -> Self {
        PathValue(Arc::new(
            raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        ))
    }

    /// Build a `PathValue` directly from captured pairs, for adapters (the
    /// RPC transcoder, the typed-OpenAPI binder) that resolve path captures
    /// outside of this crate's own `Router`.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        PathValue(Arc::new(pairs))
    }

    /// Pull the captured value for `name` out of a request's extensions.
    /// Returns `None` both when the router captured nothing under that name
    /// and when the request never passed through a `Router` at all.
    pub fn get(req: &Request, name: &str) -> Option<String> {
        req.extensions()
            .get::<PathValue>()
            .and_then(|pv| pv.value(name))
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }
}

/// Per-pattern method table: `None` is the catch-all ("any method")
/// registration, `Some(method)` is an exact method match.
type MethodTable = HashMap<Option<Method>, BoxedHandler>;

fn clone_table(table: &MethodTable) -> MethodTable {
    table.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Registration-time route table. The spec requires the table be read-only
/// after the first handler-extraction; nothing enforces that at the type
/// level here (matching the teacher's own `AppBuilder`, which relies on
/// convention, not the compiler, to keep registration before first serve).
#[derive(Default)]
pub struct Router {
    patterns: HashMap<String, MethodTable>,
    order: Vec<String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` at `method` (or `None` for any method) and
    /// `pattern`. Fails with [`ConfigFatal`] if that exact method+pattern
    /// pair was already registered — duplicate registration is a
    /// configuration error, not a panic (spec §4.1, §7).
    pub fn register(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: BoxedHandler,
    ) -> Result<(), ConfigFatal> {
        if !self.patterns.contains_key(pattern) {
            self.order.push(pattern.to_string());
        }
        let table = self.patterns.entry(pattern.to_string()).or_default();
        if table.contains_key(&method) {
            return Err(ConfigFatal(format!(
                "duplicate route registration: {} {}",
                method.as_ref().map(Method::as_str).unwrap_or("ANY"),
                pattern
            )));
        }
        table.insert(method, handler);
        Ok(())
    }

    /// Patterns in registration order, for `reveal_routes` logging.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Build a fresh `axum::Router` from the current table. Callable more
    /// than once (e.g. across repeated `Handler()` calls that let hooks
    /// register additional routes); each call snapshots the table as it
    /// stands at that moment.
    pub fn build(&self) -> axum::Router {
        let mut router = axum::Router::new();
        for pattern in &self.order {
            let Some(table) = self.patterns.get(pattern) else {
                continue;
            };
            let table = Arc::new(clone_table(table));

            router = router.route(pattern, any({
                let table = table.clone();
                move |req: Request| {
                    let table = table.clone();
                    async move { dispatch(table, req).await }
                }
            }));

            // Go's `net/http.ServeMux` treats a pattern ending in `/`
            // (other than the root) as a subtree match covering every path
            // beneath it. axum's matcher is exact by default, so we
            // additionally register a wildcard variant routed to the same
            // method table.
            if pattern != "/" && pattern.ends_with('/') {
                let wildcard = format!("{pattern}{{*portico_subtree}}");
                router = router.route(&wildcard, any(move |req: Request| {
                    let table = table.clone();
                    async move { dispatch(table, req).await }
                }));
            }
        }
        router
    }
}

async fn dispatch(table: Arc<MethodTable>, mut req: Request) -> Response {
    let (mut parts, body) = req.into_parts();
    let path_value = match axum::extract::RawPathParams::from_request_parts(&mut parts, &()).await
    {
        Ok(raw) => PathValue::from_raw(&raw),
        Err(_) => PathValue::default(),
    };
    parts.extensions.insert(path_value);
    req = Request::from_parts(parts, body);

    let method = req.method().clone();
    if let Some(handler) = table.get(&Some(method.clone())) {
        return handler.call(req).await;
    }
    if let Some(handler) = table.get(&None) {
        return handler.call(req).await;
    }
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn text_handler(body: &'static str) -> BoxedHandler {
        Arc::new(move |_req: Request| async move { body.into_response() })
    }

    #[tokio::test]
    async fn duplicate_method_and_pattern_is_rejected() {
        let mut router = Router::new();
        router
            .register(Some(Method::GET), "/users", text_handler("a"))
            .unwrap();
        let err = router
            .register(Some(Method::GET), "/users", text_handler("b"))
            .unwrap_err();
        assert!(err.0.contains("/users"));
    }

    #[tokio::test]
    async fn distinct_methods_on_same_pattern_both_dispatch() {
        let mut router = Router::new();
        router
            .register(Some(Method::GET), "/users", text_handler("get"))
            .unwrap();
        router
            .register(Some(Method::POST), "/users", text_handler("post"))
            .unwrap();
        let app = router.build();

        let resp = app
            .clone()
            .oneshot(Request::get("/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"get");

        let resp = app
            .oneshot(Request::post("/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"post");
    }

    #[tokio::test]
    async fn path_matched_but_method_missing_is_405() {
        let mut router = Router::new();
        router
            .register(Some(Method::GET), "/users", text_handler("get"))
            .unwrap();
        let app = router.build();
        let resp = app
            .oneshot(Request::post("/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn subtree_pattern_matches_nested_paths() {
        let mut router = Router::new();
        router.register(None, "/static/", text_handler("file")).unwrap();
        let app = router.build();
        let resp = app
            .oneshot(Request::get("/static/a/b.css").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn path_value_captures_named_segment() {
        let mut router = Router::new();
        router
            .register(
                Some(Method::GET),
                "/users/{id}",
                Arc::new(|req: Request| async move {
                    let id = PathValue::get(&req, "id").unwrap_or_default();
                    id.into_response()
                }),
            )
            .unwrap();
        let app = router.build();
        let resp = app
            .oneshot(Request::get("/users/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"42");
    }
}
