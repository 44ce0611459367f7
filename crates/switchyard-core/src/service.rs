//! Service definitions: named groups of actions

use crate::context::Context;
use crate::error::ActionError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result of an action. `None` means the action produced no value.
pub type ActionResult = Result<Option<Value>, ActionError>;

/// Boxed future returned by action handlers
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

/// Type alias for async action handler functions
pub type ActionHandler = Arc<dyn Fn(Context) -> ActionFuture + Send + Sync>;

/// A named service exposing actions as `<service>.<action>`
pub struct Service {
    name: String,
    actions: Vec<(String, ActionHandler)>,
}

impl Service {
    /// Create an empty service
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Register an action handler
    pub fn action<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |ctx: Context| Box::pin(handler(ctx)) as ActionFuture);
        self.actions.push((name.into(), handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified names of the registered actions
    pub fn action_names(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|(action, _)| format!("{}.{}", self.name, action))
            .collect()
    }

    pub(crate) fn into_actions(self) -> impl Iterator<Item = (String, ActionHandler)> {
        let name = self.name;
        self.actions
            .into_iter()
            .map(move |(action, handler)| (format!("{}.{}", name, action), handler))
    }
}
