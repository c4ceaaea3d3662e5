//! The RPC scope (`spec.md` §4.5): a registration façade constructed
//! against a running `Server` that introspects RPC constructors, mounts
//! services, and aggregates cross-scope state (service names, routed
//! services) through the server's `HookRegistry` so independent scopes on
//! one server still share one reflection/health surface.

use std::sync::Arc;

use axum::extract::Request;
use portico_core::hooks::{HookOptions, HookRegistry};
use portico_core::mux::Mux;

use crate::health;
use crate::introspect::RpcConstructor;
#[cfg(feature = "reflection")]
use crate::reflection;
use crate::registry::{RouteFold, ServiceName};
use crate::transcoder::{TranscoderEntry, TranscodingOptions};

/// Per-call option propagated to every registered service. Tonic's
/// generated constructors have a fixed shape and don't themselves accept
/// extra options, so these are forwarded to whatever the scope's transcoder
/// or validation layer consults, not threaded through `construct()` itself.
#[derive(Debug, Clone)]
pub struct HandlerOption {
    pub name: &'static str,
}

impl HandlerOption {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

/// Reverse-proxy mounting for an externally-running gRPC target (`spec.md`
/// §4.5: "optional RPC-gateway (with a mount-path pattern, target port, and
/// context)"). Unlike [`crate::transcoder::Transcoder`], which runs
/// in-process against services this same scope constructed, the gateway
/// forwards to a *separate* gRPC server — proxying its traffic needs an
/// HTTP client the workspace's dependency stack intentionally doesn't
/// carry (see `DESIGN.md`), so this type resolves the gateway's mount
/// pattern only; wiring an actual forwarder is left to the embedding
/// binary, the same way `r2e_grpc::GrpcServer` leaves transport assembly
/// to an explicit `.serve()` call rather than an implicit hook.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Explicit mount pattern. `None` falls back to `join(prefix, suffix)`
    /// per spec.md §4.5.
    pub pattern: Option<String>,
    pub target_port: u16,
    pub context: String,
}

/// Static configuration an [`RpcScope`] is constructed with.
#[derive(Debug, Clone, Default)]
pub struct RpcScopeOptions {
    pub health: bool,
    pub reflection: bool,
    #[cfg(feature = "reflection")]
    pub reflection_descriptor_set: Option<Vec<u8>>,
    pub validate: bool,
    pub transcoding: Option<TranscodingOptions>,
    pub gateway: Option<GatewayOptions>,
    pub prefix: String,
    pub suffix: String,
    pub handler_options: Vec<HandlerOption>,
}

/// Registration façade. Holds a reference to the server's shared
/// [`HookRegistry`] (the aggregator all scopes on one server share) plus
/// this scope's own static configuration.
pub struct RpcScope {
    hooks: Arc<HookRegistry>,
    options: RpcScopeOptions,
    volatile_transcoding: Option<TranscodingOptions>,
}

impl RpcScope {
    /// Construct the scope and, in the same step, install its deferred
    /// handler-extract hook (`spec.md` §4.5: health/reflection/REST
    /// transcoding are all "bound... over the current shared service-name
    /// list", meaning they can only be built once every `register()` call
    /// on every scope sharing this `hooks` has run). Mirrors
    /// `portico_openapi::register::OpenApiScope::new`'s "one once-hook per
    /// facade instance, sharing one registry" shape.
    pub fn new(hooks: Arc<HookRegistry>, options: RpcScopeOptions) -> Self {
        let scope = Self {
            hooks,
            options,
            volatile_transcoding: None,
        };
        scope.install_auxiliary_routes();
        scope
    }

    /// Register the once-hook that builds health/reflection services from
    /// the final shared service-name list and mounts every accumulated
    /// transcoder's HTTP bindings onto the real `Mux`. Runs at handler
    /// extraction, after every scope's `register()` calls have pushed their
    /// `ServiceName`/`TranscoderEntry` contributions.
    fn install_auxiliary_routes(&self) {
        let hooks = self.hooks.clone();
        let health_enabled = self.options.health;
        #[cfg(feature = "reflection")]
        let reflection_descriptor_set = if self.options.reflection {
            self.options.reflection_descriptor_set.clone()
        } else {
            None
        };

        self.hooks.on_handler_extract(HookOptions { once: true }, move |mux: &mut Mux| {
            let service_names = hooks.snapshot::<ServiceName>().into_iter().map(|n| n.0).collect::<Vec<_>>();

            if health_enabled {
                let (_reporter, service) = health::build_health_service(&service_names);
                hooks.push(RouteFold::new(move |b| {
                    let mut b = b;
                    b.add_service(service);
                    b
                }));
            }

            #[cfg(feature = "reflection")]
            if let Some(descriptor_set) = &reflection_descriptor_set {
                match reflection::build_reflection_services(descriptor_set, &service_names) {
                    Ok((v1, v1alpha)) => {
                        hooks.push(RouteFold::new(move |b| {
                            let mut b = b;
                            b.add_service(v1);
                            b
                        }));
                        hooks.push(RouteFold::new(move |b| {
                            let mut b = b;
                            b.add_service(v1alpha);
                            b
                        }));
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "failed to build reflection services");
                    }
                }
            }

            for entry in hooks.snapshot::<TranscoderEntry>() {
                for binding in entry.transcoder.bindings() {
                    let full_path = join_mount(&entry.mount_prefix, &binding.path_template);
                    let transcoder = entry.transcoder.clone();
                    let result = mux.handle_fn(Some(binding.method.clone()), &full_path, move |req: Request| {
                        transcoder.handle(req)
                    });
                    if let Err(err) = result {
                        tracing::error!(path = %full_path, error = %err, "failed to mount transcoder binding");
                    }
                }
            }
        });
    }

    /// Join the scope's prefix and suffix around `pattern`, trimmed of
    /// surrounding slashes per spec's `join(prefix, pattern, suffix)`.
    fn mount_pattern(&self, pattern: &str) -> String {
        let trimmed = pattern.trim_matches('/');
        let mut joined = String::new();
        if !self.options.prefix.is_empty() {
            joined.push_str(self.options.prefix.trim_matches('/'));
            joined.push('/');
        }
        joined.push_str(trimmed);
        if !self.options.suffix.is_empty() {
            joined.push('/');
            joined.push_str(self.options.suffix.trim_matches('/'));
        }
        joined
    }

    /// Capture per-service transcoder options for the next `register()` call
    /// only. Mirrors the spec's single-use `UseTranscoder(opts...)` facade.
    pub fn use_transcoder(&mut self, opts: TranscodingOptions) -> &mut Self {
        self.volatile_transcoding = Some(opts);
        self
    }

    /// Register a service implementation against a constructor. Resolves
    /// the fully qualified service name from the constructed `NamedService`
    /// (tonic codegen already derives this from the `.proto` package/service
    /// name — no separate descriptor-pool lookup is needed for this step,
    /// unlike the reflection-based original), appends it to the
    /// server-shared name list, folds the routed service into the
    /// server-shared gateway route list, and records a transcoder entry if
    /// transcoding is enabled for this call.
    pub fn register<Impl, C>(&mut self, imp: Impl, constructor: C, opts: &[HandlerOption]) -> String
    where
        Impl: Send + Sync + 'static,
        C: RpcConstructor<Impl>,
    {
        if self.options.validate && opts.is_empty() && self.options.handler_options.is_empty() {
            panic!("RPC scope validation is enabled but no handler options were supplied for this registration");
        }

        let merged_opts: Vec<HandlerOption> = self
            .options
            .handler_options
            .iter()
            .cloned()
            .chain(opts.iter().cloned())
            .collect();

        let (pattern, fold) = constructor.construct(imp, &merged_opts);
        let mounted = self.mount_pattern(pattern);

        self.hooks.push(ServiceName(mounted.clone()));
        self.hooks.push(fold);

        let transcoding = self.volatile_transcoding.take().or_else(|| self.options.transcoding.clone());
        if let Some(cfg) = transcoding {
            tracing::debug!(pattern = %mounted, mount = %cfg.mount_prefix, "REST transcoding enabled for service");
            self.hooks.push(TranscoderEntry {
                mount_prefix: cfg.mount_prefix,
                transcoder: cfg.transcoder,
            });
        }

        tracing::info!(pattern = %mounted, options = merged_opts.len(), "registered RPC service");
        mounted
    }

    /// Resolve the gateway's mount pattern per spec.md §4.5: the gateway's
    /// own pattern if set, else `join(prefix, suffix)`. `None` if no
    /// gateway is configured for this scope.
    pub fn gateway_mount_pattern(&self) -> Option<String> {
        let gateway = self.options.gateway.as_ref()?;
        Some(match &gateway.pattern {
            Some(pattern) => self.mount_pattern(pattern),
            None => self.mount_pattern(&self.options.suffix),
        })
    }

    pub fn options(&self) -> &RpcScopeOptions {
        &self.options
    }

    pub(crate) fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }
}

/// Join a transcoder's mount prefix and one of its binding path templates,
/// trimmed of surrounding slashes the same way [`RpcScope::mount_pattern`]
/// joins prefix/suffix.
fn join_mount(prefix: &str, path_template: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let suffix = path_template.trim_start_matches('/');
    if prefix.is_empty() {
        format!("/{suffix}")
    } else {
        format!("/{prefix}/{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::body::Body;
    use http::{Method, Request as HttpRequest};
    use http_body_util::BodyExt;
    use portico_core::config::ServerConfig;
    use portico_core::server::Server;
    use tower::ServiceExt;

    use crate::transcoder::{EchoTranscoder, HttpBinding};

    #[test]
    fn mount_pattern_joins_prefix_and_suffix_trimmed() {
        let scope = RpcScope::new(
            Arc::new(HookRegistry::new()),
            RpcScopeOptions {
                prefix: "/rpc/".to_string(),
                suffix: "/v1/".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(scope.mount_pattern("/greeter/"), "rpc/greeter/v1");
    }

    #[test]
    fn mount_pattern_with_no_prefix_or_suffix_is_just_the_pattern() {
        let scope = RpcScope::new(Arc::new(HookRegistry::new()), RpcScopeOptions::default());
        assert_eq!(scope.mount_pattern("greeter"), "greeter");
    }

    #[test]
    fn gateway_mount_uses_its_own_pattern_when_set() {
        let scope = RpcScope::new(
            Arc::new(HookRegistry::new()),
            RpcScopeOptions {
                prefix: "rpc".to_string(),
                gateway: Some(GatewayOptions {
                    pattern: Some("gw".to_string()),
                    target_port: 50051,
                    context: "upstream".to_string(),
                }),
                ..Default::default()
            },
        );
        assert_eq!(scope.gateway_mount_pattern().as_deref(), Some("rpc/gw"));
    }

    #[test]
    fn gateway_mount_falls_back_to_prefix_and_suffix_when_unset() {
        let scope = RpcScope::new(
            Arc::new(HookRegistry::new()),
            RpcScopeOptions {
                prefix: "rpc".to_string(),
                suffix: "gateway".to_string(),
                gateway: Some(GatewayOptions {
                    pattern: None,
                    target_port: 50051,
                    context: "upstream".to_string(),
                }),
                ..Default::default()
            },
        );
        assert_eq!(scope.gateway_mount_pattern().as_deref(), Some("rpc/gateway"));
    }

    #[test]
    fn no_gateway_configured_yields_none() {
        let scope = RpcScope::new(Arc::new(HookRegistry::new()), RpcScopeOptions::default());
        assert_eq!(scope.gateway_mount_pattern(), None);
    }

    fn dummy_fold() -> RouteFold {
        RouteFold::new(|b| b)
    }

    #[test]
    fn register_merges_scope_and_call_handler_options() {
        let mut scope = RpcScope::new(
            Arc::new(HookRegistry::new()),
            RpcScopeOptions {
                handler_options: vec![HandlerOption::new("scope-wide")],
                ..Default::default()
            },
        );

        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let ctor = move |_imp: (), opts: &[HandlerOption]| {
            seen_clone.lock().unwrap().push(opts.len());
            ("svc", dummy_fold())
        };

        scope.register((), ctor, &[HandlerOption::new("call-site")]);
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    #[should_panic(expected = "no handler options were supplied")]
    fn register_panics_when_validate_enabled_without_any_handler_options() {
        let mut scope = RpcScope::new(
            Arc::new(HookRegistry::new()),
            RpcScopeOptions {
                validate: true,
                ..Default::default()
            },
        );
        scope.register((), |_imp: (), _opts: &[HandlerOption]| ("svc", dummy_fold()), &[]);
    }

    #[test]
    fn register_with_validate_and_call_site_options_does_not_panic() {
        let mut scope = RpcScope::new(
            Arc::new(HookRegistry::new()),
            RpcScopeOptions {
                validate: true,
                ..Default::default()
            },
        );
        scope.register(
            (),
            |_imp: (), _opts: &[HandlerOption]| ("svc", dummy_fold()),
            &[HandlerOption::new("present")],
        );
    }

    #[tokio::test]
    async fn install_auxiliary_routes_mounts_transcoder_bindings_onto_mux() {
        let server = Server::new("demo", (), ServerConfig::default());
        let hooks = server.hooks();
        let transcoder = Arc::new(EchoTranscoder::new(
            vec![HttpBinding::new(Method::GET, "/greeting/{who}")],
            vec!["who"],
        ));
        let mut scope = RpcScope::new(
            hooks,
            RpcScopeOptions {
                transcoding: Some(TranscodingOptions::new("echo", transcoder)),
                ..Default::default()
            },
        );
        scope.register((), |_imp: (), _opts: &[HandlerOption]| ("greeter", dummy_fold()), &[]);

        // `Server::handler()` runs every registered handler-extract hook,
        // including the one `RpcScope::new` installed above.
        let app = server.handler();
        let resp = app
            .oneshot(
                HttpRequest::get("/echo/greeting/ada")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["who"], "ada");
    }

    #[tokio::test]
    async fn install_auxiliary_routes_builds_health_service_from_shared_names() {
        let server = Server::new("demo", (), ServerConfig::default());
        let hooks = server.hooks();
        let mut scope = RpcScope::new(
            hooks.clone(),
            RpcScopeOptions {
                health: true,
                ..Default::default()
            },
        );
        scope.register((), |_imp: (), _opts: &[HandlerOption]| ("greeter", dummy_fold()), &[]);

        let _app = server.handler();
        let (_routes, names) = crate::gateway::collect(&hooks);
        assert_eq!(names, vec!["greeter".to_string()]);
    }

    #[test]
    fn join_mount_trims_surrounding_slashes() {
        assert_eq!(join_mount("/echo/", "/greeting/{who}"), "/echo/greeting/{who}");
        assert_eq!(join_mount("", "/greeting"), "/greeting");
    }
}
