//! REST transcoding (`spec.md` §4.5, §6): a pluggable external collaborator
//! that maps declared HTTP bindings (method + templated path, in the style
//! of `google.api.http` annotations) onto a unary RPC handler.
//!
//! Only the interface and a minimal in-process reference implementation are
//! shipped here — the real transcoder (protobuf-JSON mapping, dynamic
//! message construction) is an external service per spec §1's "pluggable
//! external" framing, matching how `portico_core::middleware::cors`/
//! `recover` ship reference implementations of otherwise-external
//! middleware contracts.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::extract::Request;
use http::Method;

use portico_core::router::{BoxFuture, PathValue};

/// Per-service transcoder configuration captured by `RpcScope::register`
/// (or the single-use `use_transcoder` facade).
#[derive(Clone)]
pub struct TranscodingOptions {
    /// Path prefix the scope's transcoded routes are mounted under.
    pub mount_prefix: String,
    /// The transcoder whose bindings get mounted under `mount_prefix` at
    /// the next handler-extract hook run.
    pub transcoder: Arc<dyn Transcoder>,
}

impl TranscodingOptions {
    pub fn new(mount_prefix: impl Into<String>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            mount_prefix: mount_prefix.into(),
            transcoder,
        }
    }
}

impl std::fmt::Debug for TranscodingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodingOptions")
            .field("mount_prefix", &self.mount_prefix)
            .field("transcoder", &"<dyn Transcoder>")
            .finish()
    }
}

/// A transcoder contributed by one `RpcScope::register` call, pushed to the
/// server-shared hook registry so the scope's deferred handler-extract hook
/// can mount every accumulated transcoder's bindings in one pass.
#[derive(Clone)]
pub struct TranscoderEntry {
    pub mount_prefix: String,
    pub transcoder: Arc<dyn Transcoder>,
}

/// One HTTP binding a transcoder exposes for a unary method: an HTTP
/// method plus a `{name}`-templated path (the same capture syntax
/// `portico_core::router` speaks).
#[derive(Debug, Clone)]
pub struct HttpBinding {
    pub method: Method,
    pub path_template: String,
}

impl HttpBinding {
    pub fn new(method: Method, path_template: impl Into<String>) -> Self {
        Self {
            method,
            path_template: path_template.into(),
        }
    }
}

/// External collaborator contract: given the declared bindings for a unary
/// method, handle one transcoded HTTP request and translate its response
/// back to HTTP.
pub trait Transcoder: Send + Sync + 'static {
    fn bindings(&self) -> &[HttpBinding];
    fn handle(&self, req: Request) -> BoxFuture<Response>;
}

/// A reference transcoder that echoes the path-captured fields as a JSON
/// object — enough to exercise the binding plumbing without depending on a
/// real protobuf-JSON mapping library.
pub struct EchoTranscoder {
    bindings: Vec<HttpBinding>,
    field_names: Vec<&'static str>,
}

impl EchoTranscoder {
    pub fn new(bindings: Vec<HttpBinding>, field_names: Vec<&'static str>) -> Self {
        Self { bindings, field_names }
    }
}

impl Transcoder for EchoTranscoder {
    fn bindings(&self) -> &[HttpBinding] {
        &self.bindings
    }

    fn handle(&self, req: Request) -> BoxFuture<Response> {
        let fields = self.field_names.clone();
        Box::pin(async move {
            let mut object = serde_json::Map::new();
            for name in fields {
                if let Some(value) = PathValue::get(&req, name) {
                    object.insert(name.to_string(), serde_json::Value::String(value));
                }
            }
            axum::Json(serde_json::Value::Object(object)).into_response()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::Request as HttpRequest;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn echo_transcoder_reflects_path_captured_fields() {
        let transcoder = EchoTranscoder::new(
            vec![HttpBinding::new(Method::GET, "/greeting/{who}")],
            vec!["who"],
        );
        assert_eq!(transcoder.bindings().len(), 1);

        let mut req = HttpRequest::get("/greeting/ada").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(PathValue::from_pairs(vec![("who".to_string(), "ada".to_string())]));

        let resp = transcoder.handle(req).await;
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["who"], "ada");
    }
}
