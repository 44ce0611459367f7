//! Request context builder
//!
//! Two hooks run for every request, in order:
//! 1. pre-auth: create the dispatch context bound to `<api name>.<method>`,
//!    seeded with the path parameters
//! 2. pre-handler: after validation, replace the context params with the
//!    merged request parameters
//!
//! Merge precedence is payload < path params < query: on a key collision the
//! later source wins. The route handler dispatches with these same params.

use serde_json::Value;
use std::sync::Arc;
use switchyard_core::{ActionDescriptor, Broker, Context, Meta, Params};
use tracing::debug;

/// Merge request parameters. Non-object payloads contribute nothing.
pub fn merge_params(payload: Option<&Value>, path_params: &Params, query: &Params) -> Params {
    let mut merged = Params::new();
    if let Some(Value::Object(payload)) = payload {
        merged.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged.extend(path_params.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.extend(query.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Builds per-request dispatch contexts
#[derive(Clone)]
pub struct ContextBuilder {
    api_name: String,
    broker: Arc<dyn Broker>,
}

impl ContextBuilder {
    pub fn new(api_name: impl Into<String>, broker: Arc<dyn Broker>) -> Self {
        Self {
            api_name: api_name.into(),
            broker,
        }
    }

    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    /// Action name a request context is bound to
    pub fn action_name(&self, method: &http::Method) -> String {
        format!("{}.{}", self.api_name, method.as_str().to_lowercase())
    }

    /// Pre-auth hook: create the request's dispatch context
    pub fn on_pre_auth(&self, method: &http::Method, path_params: &Params) -> Context {
        let ctx = Context::create(
            Arc::clone(&self.broker),
            ActionDescriptor::new(self.action_name(method)),
            self.broker.node_id(),
            path_params.clone(),
            Meta::new(),
        );
        debug!("Context {} created for {}", ctx.id(), ctx.action().name);
        ctx
    }

    /// Pre-handler hook: overwrite the context params with the merged set
    pub fn on_pre_handler(
        &self,
        ctx: &mut Context,
        payload: Option<&Value>,
        path_params: &Params,
        query: &Params,
    ) {
        let params = merge_params(payload, path_params, query);
        debug!("Context {} params merged: {} keys", ctx.id(), params.len());
        ctx.set_params(params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_core::{BrokerConfig, ServiceBroker};

    fn map(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_merge_precedence() {
        let payload = json!({ "a": 1 });
        let path_params = map(json!({ "a": 2, "b": 2 }));
        let query = map(json!({ "a": 3 }));

        let merged = merge_params(Some(&payload), &path_params, &query);
        assert_eq!(Value::Object(merged), json!({ "a": 3, "b": 2 }));
    }

    #[test]
    fn test_merge_ignores_non_object_payload() {
        let payload = json!("raw text");
        let merged = merge_params(Some(&payload), &map(json!({ "id": "1" })), &Params::new());
        assert_eq!(Value::Object(merged), json!({ "id": "1" }));
    }

    #[test]
    fn test_pre_auth_context() {
        let config = BrokerConfig {
            node_id: Some("node-1".to_string()),
            ..BrokerConfig::default()
        };
        let builder = ContextBuilder::new("api", ServiceBroker::new(config));

        let ctx = builder.on_pre_auth(&http::Method::DELETE, &map(json!({ "id": "42" })));
        assert_eq!(ctx.action().name, "api.delete");
        assert_eq!(ctx.node_id(), "node-1");
        assert_eq!(ctx.param("id"), Some(&json!("42")));
        assert!(ctx.meta().is_empty());
    }

    #[test]
    fn test_pre_handler_overwrites_params() {
        let builder = ContextBuilder::new("users", ServiceBroker::new(BrokerConfig::default()));
        let path_params = map(json!({ "id": "42" }));
        let mut ctx = builder.on_pre_auth(&http::Method::PUT, &path_params);

        let payload = json!({ "name": "x", "id": "ignored" });
        builder.on_pre_handler(&mut ctx, Some(&payload), &path_params, &map(json!({ "v": "1" })));

        assert_eq!(ctx.action().name, "users.put");
        assert_eq!(
            Value::Object(ctx.params().clone()),
            json!({ "name": "x", "id": "42", "v": "1" })
        );
    }
}
