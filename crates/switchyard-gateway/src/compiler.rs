//! Route compiler: normalized aliases to routable descriptors

use crate::alias::{expand, Alias, NormalizedRoute, PreHook, RouteOptions};
use crate::error::{GatewayError, GatewayResult};
use crate::mapping::{RouteMethod, UrlTemplate};
use crate::response::Reply;
use crate::validation::ValidationRules;
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use switchyard_core::{ActionError, Broker, Context};
use tracing::debug;

/// Type alias for compiled route handlers
pub type RouteHandler = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<Reply, ActionError>> + Send + Sync>;

/// A route ready to serve requests
#[derive(Clone)]
pub struct CompiledRoute {
    pub method: RouteMethod,
    pub template: UrlTemplate,
    pub action: String,
    pub options: RouteOptions,
    pub validation: Option<ValidationRules>,
    pub pre: Vec<PreHook>,
    handler: RouteHandler,
}

impl CompiledRoute {
    /// Dispatch the action with the context's params
    pub async fn invoke(&self, ctx: Context) -> Result<Reply, ActionError> {
        (self.handler)(ctx).await
    }

    pub fn path(&self) -> &str {
        self.template.template()
    }

    /// Summary for route listings
    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            method: self.method.to_string(),
            path: self.path().to_string(),
            action: self.action.clone(),
            options: self.options.clone(),
        }
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("method", &self.method)
            .field("path", &self.path())
            .field("action", &self.action)
            .field("options", &self.options)
            .finish()
    }
}

/// Route table entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub path: String,
    pub action: String,
    pub options: RouteOptions,
}

/// Compiles aliases against a shared broker
///
/// Built once at registration. Holds no per-request state.
#[derive(Clone)]
pub struct RouteCompiler {
    broker: Arc<dyn Broker>,
}

impl RouteCompiler {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Compile one normalized route
    pub fn compile(&self, route: NormalizedRoute) -> GatewayResult<CompiledRoute> {
        let template = UrlTemplate::new(&route.path)?;
        let validation = ValidationRules::from_options(&route.route_opts)?;

        let broker = Arc::clone(&self.broker);
        let action = route.action.clone();
        let handler: RouteHandler = Arc::new(move |ctx: Context| {
            let broker = Arc::clone(&broker);
            let action = action.clone();
            Box::pin(async move {
                let params = ctx.params().clone();
                let result = broker.call(&action, params, Some(&ctx)).await?;
                Ok(Reply::from_result(result))
            }) as BoxFuture<'static, Result<Reply, ActionError>>
        });

        debug!("Compiled route {} {} -> {}", route.method, route.path, route.action);

        Ok(CompiledRoute {
            method: route.method,
            template,
            action: route.action,
            options: route.route_opts,
            validation,
            pre: route.pre,
            handler,
        })
    }

    /// Expand and compile every alias, rejecting colliding routes
    pub fn compile_all(&self, aliases: &[Alias]) -> GatewayResult<Vec<CompiledRoute>> {
        let mut routes: Vec<CompiledRoute> = Vec::new();
        for alias in aliases {
            for normalized in expand(alias) {
                let route = self.compile(normalized)?;
                for existing in &routes {
                    if let Some((a, b)) = existing.template.parameter_clash(&route.template) {
                        return Err(GatewayError::RouteConflict {
                            method: route.method.to_string(),
                            path: format!(
                                "{} (parameter '{}' named '{}' in {})",
                                route.path(),
                                b,
                                a,
                                existing.path()
                            ),
                        });
                    }
                    if conflicts(existing, &route) {
                        return Err(GatewayError::RouteConflict {
                            method: route.method.to_string(),
                            path: format!("{} (already routed to {})", route.path(), existing.action),
                        });
                    }
                }
                routes.push(route);
            }
        }
        Ok(routes)
    }
}

fn conflicts(a: &CompiledRoute, b: &CompiledRoute) -> bool {
    a.template.same_shape(&b.template) && a.method.overlaps(&b.method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate_aliases, AliasSpec};
    use crate::response::ReplyBody;
    use serde_json::json;
    use switchyard_core::{ActionDescriptor, BrokerConfig, Meta, Params, Service, ServiceBroker};

    fn broker() -> Arc<ServiceBroker> {
        let broker = ServiceBroker::new(BrokerConfig::default());
        broker
            .add_service(
                Service::new("user")
                    .action("get", |ctx: Context| async move {
                        let id = ctx.param("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                        Ok(Some(json!(format!("Get user {}", id))))
                    })
                    .action("noret", |_ctx| async { Ok(None) }),
            )
            .unwrap();
        broker
    }

    fn context(broker: Arc<ServiceBroker>, params: Params) -> Context {
        Context::create(broker.clone(), ActionDescriptor::new("api.get"), "node", params, Meta::new())
    }

    #[test]
    fn test_compile_all_counts() {
        let aliases = validate_aliases(vec![
            AliasSpec::rest("/users", "user"),
            AliasSpec::rest("/blacklist", "user").blacklist(&["create", "update"]),
            AliasSpec::new("POST", "/user/login", "user.login"),
        ])
        .unwrap();

        let routes = RouteCompiler::new(broker()).compile_all(&aliases).unwrap();
        assert_eq!(routes.len(), 5 + 3 + 1);
        assert!(routes.iter().all(|r| r.path() != "/blacklist" || r.action != "user.create"));
    }

    #[test]
    fn test_id_routes_get_validation() {
        let aliases = validate_aliases(vec![AliasSpec::rest("/users", "user")]).unwrap();
        let routes = RouteCompiler::new(broker()).compile_all(&aliases).unwrap();

        for route in &routes {
            let has_id = route.path().ends_with("{id}");
            assert_eq!(route.validation.is_some(), has_id, "{}", route.action);
        }
    }

    #[test]
    fn test_conflicting_routes_rejected() {
        let aliases = validate_aliases(vec![
            AliasSpec::rest("/users", "user"),
            AliasSpec::new("GET", "/users/{key}", "user.other"),
        ])
        .unwrap();
        let err = RouteCompiler::new(broker()).compile_all(&aliases).unwrap_err();
        assert!(matches!(err, GatewayError::RouteConflict { .. }));

        let aliases = validate_aliases(vec![
            AliasSpec::new("*", "/any", "a.b"),
            AliasSpec::new("*", "/any", "a.c"),
        ])
        .unwrap();
        assert!(RouteCompiler::new(broker()).compile_all(&aliases).is_err());
    }

    #[test]
    fn test_any_route_coexists_with_verbs() {
        let aliases = validate_aliases(vec![
            AliasSpec::new("*", "/any", "a.b"),
            AliasSpec::new("PATCH", "/any", "a.c"),
            AliasSpec::new("POST", "/user/login", "user.login"),
            AliasSpec::new("*", "/user/login", "user.other"),
            AliasSpec::rest("/users", "user"),
            AliasSpec::new("*", "/users", "user.fallback"),
        ])
        .unwrap();
        assert_eq!(RouteCompiler::new(broker()).compile_all(&aliases).unwrap().len(), 2 + 2 + 5 + 1);
    }

    #[test]
    fn test_parameter_names_must_agree() {
        let aliases = validate_aliases(vec![
            AliasSpec::rest("/users", "user"),
            AliasSpec::new("GET", "/users/{user_id}/posts", "post.list"),
        ])
        .unwrap();
        let err = RouteCompiler::new(broker()).compile_all(&aliases).unwrap_err();
        assert!(err.to_string().contains("user_id"));

        let aliases = validate_aliases(vec![
            AliasSpec::rest("/users", "user"),
            AliasSpec::new("GET", "/users/{id}/posts", "post.list"),
            AliasSpec::new("GET", "/users/me", "user.me"),
        ])
        .unwrap();
        assert!(RouteCompiler::new(broker()).compile_all(&aliases).is_ok());
    }

    #[test]
    fn test_distinct_methods_share_path() {
        let aliases = validate_aliases(vec![
            AliasSpec::new("GET", "/user/login", "user.login"),
            AliasSpec::new("POST", "/user/login", "user.login"),
        ])
        .unwrap();
        assert_eq!(RouteCompiler::new(broker()).compile_all(&aliases).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_validate_option() {
        let aliases = validate_aliases(vec![AliasSpec::new("GET", "/x", "x.y")
            .route_opts(json!({ "validate": { "query": { "type": "date" } } }))])
        .unwrap();
        assert!(RouteCompiler::new(broker()).compile_all(&aliases).is_err());
    }

    #[tokio::test]
    async fn test_handler_dispatches_action() {
        let broker = broker();
        let aliases = validate_aliases(vec![AliasSpec::rest("/users", "user")]).unwrap();
        let routes = RouteCompiler::new(broker.clone()).compile_all(&aliases).unwrap();
        let get = routes.iter().find(|r| r.action == "user.get").unwrap();

        let mut params = Params::new();
        params.insert("id".to_string(), json!("42"));
        let reply = get.invoke(context(broker, params)).await.unwrap();
        assert_eq!(reply.body, ReplyBody::Text("Get user 42".to_string()));
    }

    #[tokio::test]
    async fn test_handler_without_result() {
        let broker = broker();
        let aliases = validate_aliases(vec![AliasSpec::new("GET", "/user/noret", "user.noret")]).unwrap();
        let routes = RouteCompiler::new(broker.clone()).compile_all(&aliases).unwrap();

        let reply = routes[0].invoke(context(broker, Params::new())).await.unwrap();
        assert_eq!(reply, Reply::empty());
    }

    #[tokio::test]
    async fn test_handler_missing_action() {
        let broker = broker();
        let aliases = validate_aliases(vec![AliasSpec::new("GET", "/error", "test")]).unwrap();
        let routes = RouteCompiler::new(broker.clone()).compile_all(&aliases).unwrap();

        let err = routes[0].invoke(context(broker, Params::new())).await.unwrap_err();
        assert_eq!(err.code, Some(404));
    }

    #[test]
    fn test_route_info() {
        let aliases = validate_aliases(vec![AliasSpec::rest("/rest", "user")
            .route_opts(json!({ "all": { "description": "Rest description" } }))])
        .unwrap();
        let routes = RouteCompiler::new(broker()).compile_all(&aliases).unwrap();
        let info = routes[0].info();
        assert_eq!(info.method, "GET");
        assert_eq!(info.path, "/rest");
        assert_eq!(info.action, "user.list");
        assert_eq!(info.options.get("description"), Some(&json!("Rest description")));
    }
}
