//! Dispatch context passed into every action invocation.

use crate::broker::Broker;
use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Action parameters
pub type Params = Map<String, Value>;

/// Call metadata carried from parent to child contexts
pub type Meta = Map<String, Value>;

/// Describes the action a context is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Per-call dispatch context
///
/// A context is owned by exactly one request or call. Child contexts created
/// through [`Context::call`] copy the metadata and share the request id.
#[derive(Clone)]
pub struct Context {
    id: String,
    broker: Arc<dyn Broker>,
    action: ActionDescriptor,
    node_id: String,
    caller: Option<String>,
    params: Params,
    meta: Meta,
    level: u32,
    request_id: String,
    parent_id: Option<String>,
}

impl Context {
    /// Create a root context
    pub fn create(
        broker: Arc<dyn Broker>,
        action: ActionDescriptor,
        node_id: impl Into<String>,
        params: Params,
        meta: Meta,
    ) -> Self {
        let id = Uuid::now_v7().to_string();
        Self {
            request_id: id.clone(),
            id,
            broker,
            action,
            node_id: node_id.into(),
            caller: None,
            params,
            meta,
            level: 1,
            parent_id: None,
        }
    }

    /// Derive the context for a nested call to `action`
    pub fn child(&self, action: &str, params: Params) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            broker: Arc::clone(&self.broker),
            action: ActionDescriptor::new(action),
            node_id: self.node_id.clone(),
            caller: Some(self.action.name.clone()),
            params,
            meta: self.meta.clone(),
            level: self.level + 1,
            request_id: self.request_id.clone(),
            parent_id: Some(self.id.clone()),
        }
    }

    /// Call another action through the broker with this context as parent
    pub async fn call(&self, action: &str, params: Params) -> Result<Option<Value>, ActionError> {
        self.broker.call(action, params, Some(self)).await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub fn action(&self) -> &ActionDescriptor {
        &self.action
    }

    /// Node identity of the caller
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Action name of the parent context, if any
    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Get a single parameter
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Replace the parameter set
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Nesting depth, 1 for root contexts
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("action", &self.action.name)
            .field("node_id", &self.node_id)
            .field("caller", &self.caller)
            .field("params", &self.params)
            .field("meta", &self.meta)
            .field("level", &self.level)
            .field("request_id", &self.request_id)
            .finish()
    }
}
