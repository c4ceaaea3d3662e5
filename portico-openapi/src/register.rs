//! Registration façade (spec.md §4.6.2): binds a `(method, pattern)` pair to
//! a decoder/handler/encoder chain and appends the resulting
//! [`Operation`] to the server-shared aggregator, the same `HookRegistry`
//! mechanism `portico_rpc::RpcScope` uses for its service-name list.

use std::sync::Arc;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::Method;
use schemars::JsonSchema;

use portico_core::error::ConfigFatal;
use portico_core::hooks::{HookOptions, HookRegistry};
use portico_core::mux::Mux;

use crate::binding::Binding;
use crate::document::{docs_ui_html, render_bytes, DocumentFormat, DocumentOptions};
use crate::operation::{Operation, OperationOptions};
use crate::output::OperationOutput;

/// Groups operations sharing a document: one `openapi.{json|yaml}` +
/// optional docs-UI page, rendered once at first handler extraction from
/// every operation registered across every `OpenApiScope` sharing `hooks`.
pub struct OpenApiScope {
    hooks: Arc<HookRegistry>,
}

impl OpenApiScope {
    /// Create a scope and install its document-rendering hook. `options`
    /// is captured at this point; later `register()` calls only contribute
    /// operations, they don't reopen document configuration.
    pub fn new(hooks: Arc<HookRegistry>, options: DocumentOptions) -> Self {
        let install_hooks = hooks.clone();
        install_hooks.on_handler_extract(HookOptions { once: true }, move |mux: &mut Mux| {
            let operations: Vec<Operation> = hooks.drain();
            let rendered = render_bytes(&options, &operations)
                .expect("invalid OpenAPI document configuration");
            let (media_type, ext) = match options.format {
                DocumentFormat::Json => ("application/json", "json"),
                DocumentFormat::Yaml => ("application/yaml", "yaml"),
            };
            let mount = options.mount_path.trim_end_matches('/');
            let document_path = format!("{mount}/openapi.{ext}");

            let body = Arc::new(rendered);
            let route_body = body.clone();
            mux.get(&document_path, move |_req: Request| {
                let body = route_body.clone();
                async move {
                    ([(http::header::CONTENT_TYPE, media_type)], (*body).clone()).into_response()
                }
            })
            .expect("duplicate OpenAPI document route");

            if options.docs_ui {
                let ui_path = format!("{mount}/openapi");
                let html = docs_ui_html(&options.title, &document_path);
                mux.get(&ui_path, move |_req: Request| {
                    let html = html.clone();
                    async move { ([(http::header::CONTENT_TYPE, "text/html")], html).into_response() }
                })
                .expect("duplicate OpenAPI docs-UI route");
            }
        });

        Self { hooks: hooks.clone() }
    }

    /// Register one operation: binds `pattern` on `mux` to
    /// `decoder -> handler -> encoder`, and appends its descriptor to the
    /// shared aggregator for the next document render.
    pub fn register<I, O, F, Fut>(
        &mut self,
        mux: &mut Mux,
        method: Method,
        pattern: &str,
        binding: Binding<I>,
        handler: F,
        options: OperationOptions,
    ) -> Result<(), ConfigFatal>
    where
        I: Default + Send + Sync + 'static,
        O: OperationOutput + JsonSchema + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = O> + Send + 'static,
    {
        if binding.has_conflicting_body_and_form() {
            return Err(ConfigFatal(format!(
                "{pattern}: a binding cannot carry both a body and form fields"
            )));
        }

        let operation = Operation {
            method: method.clone(),
            pattern: pattern.to_string(),
            parameters: binding.parameters(),
            request_body: binding.request_body_schema().cloned(),
            options,
            response_media_type: O::MEDIA_TYPE,
            response_schema: Some(serde_json::to_value(schemars::schema_for!(O)).unwrap()),
        };
        self.hooks.push(operation);

        let binding = Arc::new(binding);
        let handler = Arc::new(handler);
        mux.handle_fn(Some(method), pattern, move |req: Request| {
            let binding = binding.clone();
            let handler = handler.clone();
            async move {
                match binding.decode(req).await {
                    Ok(input) => (*handler)(input).await.respond(),
                    Err(err) => err.into_response(),
                }
            }
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use portico_core::config::ServerConfig;
    use portico_core::server::Server;
    use tower::ServiceExt;

    #[derive(Default)]
    struct Greet {
        name: String,
    }

    #[tokio::test]
    async fn registered_operation_is_reachable_and_appends_to_the_aggregator() {
        let mut server = Server::new("demo", (), ServerConfig::default());
        let hooks = server.hooks();
        let mut scope = OpenApiScope::new(
            hooks.clone(),
            DocumentOptions::new("Demo", "/docs"),
        );

        let mut mux = server.group("");
        scope
            .register(
                &mut mux,
                Method::GET,
                "/greet/{name}",
                Binding::<Greet>::new().path(
                    "name",
                    crate::binding::FieldOptions::new().required(),
                    |i: &mut Greet, v: String| i.name = v,
                ),
                |input: Greet| async move { format!("hello {}", input.name) },
                OperationOptions::new().summary("Greet someone"),
            )
            .unwrap();

        let app = server.handler();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/greet/ada")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);

        let doc_resp = server
            .handler()
            .oneshot(
                Request::builder()
                    .uri("/docs/openapi.yaml")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(doc_resp.status(), http::StatusCode::OK);
    }
}
