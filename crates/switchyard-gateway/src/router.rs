//! axum host adapter and gateway builder
//!
//! Every compiled route is registered with axum under its own path and method
//! filter; axum does the matching and hands the pipeline the matched route and
//! its path parameters. `*` routes become the method fallback of their path,
//! so explicit verbs on the same path win.

use crate::alias::Alias;
use crate::compiler::{RouteCompiler, RouteInfo};
use crate::config::{api_name, validate_aliases, AliasSpec, BrokerOption, GatewayConfig};
use crate::context::ContextBuilder;
use crate::error::{GatewayError, GatewayResult, ValidationSource};
use crate::pipeline::Pipeline;
use crate::request::{InboundRequest, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::response::{Reply, ReplyBody};
use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header, Request},
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use switchyard_core::{Broker, Params};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// State shared by every request
#[derive(Clone)]
struct GatewayState {
    pipeline: Arc<Pipeline>,
    max_payload_bytes: usize,
}

/// A registered gateway: compiled routes bound to a started broker
pub struct Gateway {
    router: Router,
    broker: Arc<dyn Broker>,
    pipeline: Arc<Pipeline>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Get the axum router
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The shared broker every route dispatches through
    pub fn broker(&self) -> Arc<dyn Broker> {
        Arc::clone(&self.broker)
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.pipeline.route_table()
    }

    /// Serve on `addr` until the process is interrupted
    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        self.serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Serve on `addr` until `signal` resolves, then stop the broker
    pub async fn serve_with_shutdown<F>(self, addr: SocketAddr, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        info!("Gateway listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;

        info!("Gateway shutting down");
        if let Err(e) = self.broker.stop().await {
            tracing::warn!("Broker stop failed: {}", e);
        }
        Ok(())
    }
}

/// Gateway builder
pub struct GatewayBuilder {
    name: Option<String>,
    broker: BrokerOption,
    aliases: Vec<AliasSpec>,
    max_payload_bytes: usize,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            broker: BrokerOption::default(),
            aliases: Vec::new(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    /// Start from a loaded config file
    pub fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        let broker = config.broker_option()?;
        Ok(Self {
            name: config.name,
            broker,
            aliases: config.aliases,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        })
    }

    /// Set the api name request contexts are bound to
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn broker(mut self, broker: BrokerOption) -> Self {
        self.broker = broker;
        self
    }

    /// Dispatch through an existing broker
    pub fn broker_instance(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = BrokerOption::Instance(broker);
        self
    }

    /// Add an alias
    pub fn alias(mut self, alias: AliasSpec) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Add multiple aliases
    pub fn aliases(mut self, aliases: Vec<AliasSpec>) -> Self {
        self.aliases.extend(aliases);
        self
    }

    pub fn max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Validate options, compile every alias and start the broker
    ///
    /// Any invalid alias aborts the whole registration; no route is served.
    pub async fn build(self) -> GatewayResult<Gateway> {
        let name = api_name(self.name.as_deref());
        let aliases: Vec<Alias> = validate_aliases(self.aliases)?;
        let broker = self.broker.resolve()?;

        let routes = RouteCompiler::new(Arc::clone(&broker)).compile_all(&aliases)?;
        broker.start().await?;

        info!(
            "Gateway '{}' registered {} routes from {} aliases on node {}",
            name,
            routes.len(),
            aliases.len(),
            broker.node_id()
        );

        let pipeline = Arc::new(Pipeline::new(
            routes,
            ContextBuilder::new(name, Arc::clone(&broker)),
        ));
        let state = GatewayState {
            pipeline: Arc::clone(&pipeline),
            max_payload_bytes: self.max_payload_bytes,
        };
        let router = mount_routes(&pipeline).with_state(state);

        Ok(Gateway {
            router,
            broker,
            pipeline,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Register every compiled route with axum, one method router per path
fn mount_routes(pipeline: &Pipeline) -> Router<GatewayState> {
    let mut paths: Vec<(String, Vec<usize>)> = Vec::new();
    for (index, route) in pipeline.routes().iter().enumerate() {
        let path = route.template.axum_path();
        match paths.iter_mut().find(|(p, _)| *p == path) {
            Some((_, indices)) => indices.push(index),
            None => paths.push((path, vec![index])),
        }
    }

    let mut router = Router::new();
    for (path, indices) in paths {
        let mut method_router = MethodRouter::new();
        let mut has_fallback = false;

        for index in indices {
            let handler = move |State(state): State<GatewayState>,
                                path: Result<Path<HashMap<String, String>>, PathRejection>,
                                req: Request<Body>| async move {
                handle_route(state, index, path, req).await
            };

            method_router = match pipeline.routes()[index].method.method_filter() {
                Some(filter) => method_router.on(filter, handler),
                None => {
                    has_fallback = true;
                    method_router.fallback(handler)
                }
            };
        }

        if !has_fallback {
            method_router = method_router.fallback(route_not_found);
        }
        router = router.route(&path, method_router);
    }

    router.fallback(route_not_found)
}

/// Read the request and hand it to the pipeline with its matched route
async fn handle_route(
    state: GatewayState,
    index: usize,
    path: Result<Path<HashMap<String, String>>, PathRejection>,
    req: Request<Body>,
) -> Response {
    let (parts, body) = req.into_parts();
    debug!("{} {}", parts.method, parts.uri);

    let Some(route) = state.pipeline.routes().get(index) else {
        return state
            .pipeline
            .reject(GatewayError::RouteNotFound(parts.uri.path().to_string()))
            .into_response();
    };

    let path_params: Params = match path {
        Ok(Path(params)) => params.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
        Err(PathRejection::MissingPathParams(_)) => Params::new(),
        Err(rejection) => {
            let err = GatewayError::Validation {
                location: ValidationSource::Params,
                reason: rejection.body_text(),
            };
            return state.pipeline.reject(err).into_response();
        }
    };

    let body = match axum::body::to_bytes(body, state.max_payload_bytes).await {
        Ok(body) => body,
        Err(err) => {
            let err = if is_length_limit(&err) {
                GatewayError::PayloadTooLarge(state.max_payload_bytes)
            } else {
                GatewayError::InvalidRequestBody(err.to_string())
            };
            return state.pipeline.reject(err).into_response();
        }
    };

    let inbound = InboundRequest::from_parts(&parts, body);
    state.pipeline.handle(route, path_params, inbound).await.into_response()
}

/// Routing miss: unknown path, or a method no route on the path answers to
async fn route_not_found(State(state): State<GatewayState>, req: Request<Body>) -> Response {
    let err = GatewayError::RouteNotFound(format!("{} {}", req.method(), req.uri().path()));
    state.pipeline.reject(err).into_response()
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err as &(dyn std::error::Error + 'static));
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.body {
            ReplyBody::Empty => self.status.into_response(),
            ReplyBody::Text(text) => (
                self.status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                text,
            )
                .into_response(),
            ReplyBody::Json(value) => (self.status, Json(value)).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::json;
    use switchyard_core::{BrokerConfig, Context, Service, ServiceBroker};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_builder_defaults() {
        let gateway = Gateway::builder()
            .broker(BrokerOption::Config(BrokerConfig {
                node_id: Some("gw-1".to_string()),
                ..BrokerConfig::default()
            }))
            .alias(AliasSpec::new("GET", "/health", "$node.health"))
            .build()
            .await
            .unwrap();

        let routes = gateway.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].action, "$node.health");
        assert_eq!(gateway.broker().node_id(), "gw-1");
    }

    #[tokio::test]
    async fn test_invalid_alias_aborts_build() {
        let err = Gateway::builder()
            .alias(AliasSpec::new("GET", "/ok", "a.b"))
            .alias(AliasSpec::new("FETCH", "/bad", "a.c"))
            .build()
            .await
            .err()
            .unwrap();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("aliases[1]"));
    }

    #[tokio::test]
    async fn test_handle_dispatches_through_broker() {
        let broker = ServiceBroker::new(BrokerConfig::default());
        broker
            .add_service(Service::new("math").action("add", |ctx: Context| async move {
                let a = ctx.param("a").and_then(|v| v.as_i64()).unwrap_or(0);
                let b = ctx.param("b").and_then(|v| v.as_i64()).unwrap_or(0);
                Ok(Some(json!(a + b)))
            }))
            .unwrap();

        let gateway = Gateway::builder()
            .name("calc")
            .broker_instance(broker.clone())
            .alias(AliasSpec::new("POST", "/add", "math.add"))
            .build()
            .await
            .unwrap();
        assert!(broker.is_started());

        let req = Request::builder()
            .method("POST")
            .uri("/add")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{ "a": 2, "b": 3 }"#))
            .unwrap();
        let response = gateway.router().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"5");
    }

    async fn status_of(gateway: &Gateway, method: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = gateway.router().oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_overlapping_paths_mount() {
        let broker = ServiceBroker::new(BrokerConfig::default());
        broker
            .add_service(
                Service::new("user")
                    .action("get", |ctx: Context| async move { Ok(Some(json!({ "get": ctx.param("id") }))) })
                    .action("me", |_ctx: Context| async move { Ok(Some(json!("me"))) })
                    .action("any", |_ctx: Context| async move { Ok(Some(json!("any"))) })
                    .action("list", |_ctx: Context| async move { Ok(Some(json!([]))) }),
            )
            .unwrap();

        let gateway = Gateway::builder()
            .broker_instance(broker)
            .alias(AliasSpec::new("GET", "/users/{id}", "user.get"))
            .alias(AliasSpec::new("GET", "/users/me", "user.me"))
            .alias(AliasSpec::new("GET", "/users", "user.list"))
            .alias(AliasSpec::new("*", "/users", "user.any"))
            .build()
            .await
            .unwrap();

        assert_eq!(status_of(&gateway, "GET", "/users/me").await, (StatusCode::OK, json!("me")));
        assert_eq!(
            status_of(&gateway, "GET", "/users/7").await,
            (StatusCode::OK, json!({ "get": "7" }))
        );
        assert_eq!(status_of(&gateway, "GET", "/users").await, (StatusCode::OK, json!([])));
        assert_eq!(status_of(&gateway, "PUT", "/users").await, (StatusCode::OK, json!("any")));

        // no `*` route on the item path, so other verbs miss
        let (status, body) = status_of(&gateway, "DELETE", "/users/7").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = GatewayConfig::from_json(
            r#"{ "name": "api", "broker": { "namespace": "testnmsp" }, "aliases": [
                { "method": "REST", "path": "/users", "action": "user" }
            ] }"#,
        )
        .unwrap();

        let gateway = GatewayBuilder::from_config(config).unwrap().build().await.unwrap();
        assert_eq!(gateway.routes().len(), 5);
    }
}
