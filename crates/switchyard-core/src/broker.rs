//! Broker trait and the in-process service broker

use crate::context::{ActionDescriptor, Context, Meta, Params};
use crate::error::{ActionError, BrokerError};
use crate::service::{ActionHandler, Service};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Name of the built-in node service
pub const NODE_SERVICE: &str = "$node";

/// Resolves action names to handlers and executes them
///
/// A broker is shared by every in-flight request for the lifetime of the
/// process. Implementations synchronize internally.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Identity of this node, used as caller id in dispatch contexts
    fn node_id(&self) -> &str;

    /// Start the broker. Calling it more than once is a no-op.
    async fn start(&self) -> Result<(), BrokerError>;

    /// Stop the broker
    async fn stop(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    /// Invoke `action` with `params`. `parent` is the calling context, if any.
    async fn call(
        &self,
        action: &str,
        params: Params,
        parent: Option<&Context>,
    ) -> Result<Option<Value>, ActionError>;
}

/// Options used to construct a [`ServiceBroker`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    /// Namespace used to segment nodes
    #[serde(default)]
    pub namespace: String,

    /// Node identity. Defaults to `switchyard-<pid>`.
    #[serde(default, rename = "nodeID", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    /// Register the `$node` service
    #[serde(default = "default_internal_services")]
    pub internal_services: bool,
}

fn default_internal_services() -> bool {
    true
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            node_id: None,
            internal_services: true,
        }
    }
}

impl BrokerConfig {
    /// Parse a config from a JSON value, rejecting non-object input
    pub fn from_value(value: Value) -> Result<Self, BrokerError> {
        if !value.is_object() {
            return Err(BrokerError::InvalidConfig(
                "broker options must be an object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| BrokerError::InvalidConfig(e.to_string()))
    }

    /// Validate field values
    pub fn validate(&self) -> Result<(), BrokerError> {
        if let Some(node_id) = &self.node_id {
            if node_id.trim().is_empty() {
                return Err(BrokerError::InvalidConfig("nodeID must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

fn default_node_id() -> String {
    format!("switchyard-{}", std::process::id())
}

/// In-process broker backed by a local action registry
pub struct ServiceBroker {
    config: BrokerConfig,
    node_id: String,
    this: Weak<ServiceBroker>,
    actions: RwLock<HashMap<String, ActionHandler>>,
    services: RwLock<Vec<String>>,
    started: AtomicBool,
    created_at: Instant,
}

impl ServiceBroker {
    /// Create a broker from a config
    pub fn new(config: BrokerConfig) -> Arc<Self> {
        let broker = Self::alloc(config);
        if broker.config.internal_services {
            if let Err(e) = broker.register_node_service() {
                warn!("Node service not registered: {}", e);
            }
        }
        broker
    }

    /// Create a broker from a config, validating it first
    pub fn try_new(config: BrokerConfig) -> Result<Arc<Self>, BrokerError> {
        config.validate()?;
        let broker = Self::alloc(config);
        if broker.config.internal_services {
            broker.register_node_service()?;
        }
        Ok(broker)
    }

    fn alloc(config: BrokerConfig) -> Arc<Self> {
        let node_id = config.node_id.clone().unwrap_or_else(default_node_id);
        Arc::new_cyclic(|this: &Weak<ServiceBroker>| Self {
            config,
            node_id,
            this: this.clone(),
            actions: RwLock::new(HashMap::new()),
            services: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
            created_at: Instant::now(),
        })
    }

    /// Register a service and all of its actions
    pub fn add_service(&self, service: Service) -> Result<(), BrokerError> {
        let name = service.name().to_string();
        if name.is_empty() {
            return Err(BrokerError::InvalidService("service name is required".to_string()));
        }

        let mut actions = self.actions.write();
        let incoming: Vec<(String, ActionHandler)> = service.into_actions().collect();
        if let Some((dup, _)) = incoming.iter().find(|(action, _)| actions.contains_key(action)) {
            return Err(BrokerError::DuplicateAction(dup.clone()));
        }

        debug!("Registering service {} with {} actions", name, incoming.len());
        actions.extend(incoming);
        self.services.write().push(name);
        Ok(())
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Names of the registered services, in registration order
    pub fn services(&self) -> Vec<String> {
        self.services.read().clone()
    }

    /// Registered action names, sorted
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether an action is registered
    pub fn has_action(&self, action: &str) -> bool {
        self.actions.read().contains_key(action)
    }

    fn register_node_service(&self) -> Result<(), BrokerError> {
        let health = self.this.clone();
        let services = self.this.clone();
        let actions = self.this.clone();

        let service = Service::new(NODE_SERVICE)
            .action("health", move |_ctx| {
                let broker = health.upgrade();
                async move {
                    let broker = broker.ok_or_else(|| ActionError::new("Broker is shut down"))?;
                    Ok(Some(json!({
                        "nodeID": broker.node_id,
                        "namespace": broker.config.namespace,
                        "pid": std::process::id(),
                        "started": broker.is_started(),
                        "uptime": broker.created_at.elapsed().as_secs_f64(),
                    })))
                }
            })
            .action("services", move |_ctx| {
                let broker = services.upgrade();
                async move {
                    let broker = broker.ok_or_else(|| ActionError::new("Broker is shut down"))?;
                    Ok(Some(json!(broker.services())))
                }
            })
            .action("actions", move |_ctx| {
                let broker = actions.upgrade();
                async move {
                    let broker = broker.ok_or_else(|| ActionError::new("Broker is shut down"))?;
                    Ok(Some(json!(broker.action_names())))
                }
            });

        self.add_service(service)
    }
}

#[async_trait]
impl Broker for ServiceBroker {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn start(&self) -> Result<(), BrokerError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!(
            "ServiceBroker started: node={} namespace={:?} services={}",
            self.node_id,
            self.config.namespace,
            self.services.read().len()
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        if self.started.swap(false, Ordering::AcqRel) {
            info!("ServiceBroker stopped: node={}", self.node_id);
        }
        Ok(())
    }

    async fn call(
        &self,
        action: &str,
        params: Params,
        parent: Option<&Context>,
    ) -> Result<Option<Value>, ActionError> {
        let handler = self
            .actions
            .read()
            .get(action)
            .cloned()
            .ok_or_else(|| ActionError::service_not_found(action))?;

        let ctx = match parent {
            Some(parent) => parent.child(action, params),
            None => {
                let broker: Arc<dyn Broker> = self
                    .this
                    .upgrade()
                    .ok_or_else(|| ActionError::new("Broker is shut down"))?;
                Context::create(
                    broker,
                    ActionDescriptor::new(action),
                    self.node_id.clone(),
                    params,
                    Meta::new(),
                )
            }
        };

        debug!("Calling action {} (level {})", action, ctx.level());
        handler(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_service() -> Service {
        Service::new("user")
            .action("get", |ctx: Context| async move {
                let id = ctx.param("id").cloned().unwrap_or(Value::Null);
                Ok(Some(json!(format!("Get user {}", id.as_str().unwrap_or_default()))))
            })
            .action("noret", |_ctx| async { Ok(None) })
            .action("nested", |ctx: Context| async move {
                let mut params = Params::new();
                params.insert("id".to_string(), json!("7"));
                ctx.call("user.get", params).await
            })
            .action("caller", |ctx: Context| async move {
                Ok(Some(json!(ctx.caller())))
            })
            .action("parent", |ctx: Context| async move {
                ctx.call("user.caller", Params::new()).await
            })
    }

    #[tokio::test]
    async fn test_call_registered_action() {
        let broker = ServiceBroker::new(BrokerConfig::default());
        broker.add_service(user_service()).unwrap();

        let mut params = Params::new();
        params.insert("id".to_string(), json!("42"));
        let result = broker.call("user.get", params, None).await.unwrap();
        assert_eq!(result, Some(json!("Get user 42")));
    }

    #[tokio::test]
    async fn test_call_unknown_action() {
        let broker = ServiceBroker::new(BrokerConfig::default());
        let err = broker.call("test", Params::new(), None).await.unwrap_err();
        assert_eq!(err.code, Some(404));
        assert_eq!(err.message, "Service 'test' is not found.");
    }

    #[tokio::test]
    async fn test_action_without_result() {
        let broker = ServiceBroker::new(BrokerConfig::default());
        broker.add_service(user_service()).unwrap();
        let result = broker.call("user.noret", Params::new(), None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_nested_call() {
        let broker = ServiceBroker::new(BrokerConfig::default());
        broker.add_service(user_service()).unwrap();
        let result = broker.call("user.nested", Params::new(), None).await.unwrap();
        assert_eq!(result, Some(json!("Get user 7")));

        let caller = broker.call("user.parent", Params::new(), None).await.unwrap();
        assert_eq!(caller, Some(json!("user.parent")));
    }

    #[tokio::test]
    async fn test_duplicate_action_rejected() {
        let broker = ServiceBroker::new(BrokerConfig::default());
        broker.add_service(user_service()).unwrap();
        let err = broker
            .add_service(Service::new("user").action("get", |_ctx| async { Ok(None) }))
            .unwrap_err();
        assert!(matches!(err, BrokerError::DuplicateAction(name) if name == "user.get"));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let broker = ServiceBroker::new(BrokerConfig::default());
        assert!(!broker.is_started());
        broker.start().await.unwrap();
        broker.start().await.unwrap();
        assert!(broker.is_started());
        broker.stop().await.unwrap();
        assert!(!broker.is_started());
    }

    #[tokio::test]
    async fn test_node_service() {
        let config = BrokerConfig {
            namespace: "testnmsp".to_string(),
            node_id: Some("node-1".to_string()),
            internal_services: true,
        };
        let broker = ServiceBroker::new(config);
        broker.add_service(user_service()).unwrap();

        let health = broker.call("$node.health", Params::new(), None).await.unwrap().unwrap();
        assert_eq!(health["nodeID"], "node-1");
        assert_eq!(health["namespace"], "testnmsp");

        let services = broker.call("$node.services", Params::new(), None).await.unwrap();
        assert_eq!(services, Some(json!(["$node", "user"])));

        let actions = broker.call("$node.actions", Params::new(), None).await.unwrap().unwrap();
        assert!(actions.as_array().unwrap().contains(&json!("user.get")));
    }

    #[test]
    fn test_internal_services_disabled() {
        let config = BrokerConfig {
            internal_services: false,
            ..BrokerConfig::default()
        };
        let broker = ServiceBroker::new(config);
        assert!(broker.services().is_empty());
        assert!(!broker.has_action("$node.health"));
    }

    #[test]
    fn test_config_from_value() {
        let config = BrokerConfig::from_value(json!({ "namespace": "testnmsp", "nodeID": "n1" })).unwrap();
        assert_eq!(config.namespace, "testnmsp");
        assert_eq!(config.node_id.as_deref(), Some("n1"));
        assert!(config.internal_services);

        assert!(BrokerConfig::from_value(json!("nope")).is_err());
    }

    #[test]
    fn test_blank_node_id_rejected() {
        let config = BrokerConfig {
            node_id: Some("  ".to_string()),
            ..BrokerConfig::default()
        };
        assert!(ServiceBroker::try_new(config).is_err());
    }

    #[test]
    fn test_node_service_registration_errors_propagate() {
        let broker = ServiceBroker::try_new(BrokerConfig::default()).unwrap();
        assert!(broker.has_action("$node.health"));

        let err = broker.register_node_service().unwrap_err();
        assert!(matches!(err, BrokerError::DuplicateAction(ref action) if action.starts_with("$node.")));
        assert_eq!(broker.services(), vec!["$node".to_string()]);
    }
}
