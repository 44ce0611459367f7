//! Error types for actions and the broker lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Error kind used when an action handler fails without classifying the failure
pub const KIND_ERROR: &str = "ERROR";

/// Error kind for calls to an action no service provides
pub const KIND_SERVICE_NOT_FOUND: &str = "SERVICE_NOT_FOUND";

/// Error raised by an action invocation
///
/// `code` is the status the failure maps onto. Failures without a code are
/// uncaught errors from inside an action.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ActionError {
    /// Machine-readable error kind
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable message
    pub message: String,

    /// Status code, if the failure was classified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,

    /// Structured payload attached by the action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionError {
    /// Create an unclassified error (no status code)
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: KIND_ERROR.to_string(),
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// Set the status code
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Set the error kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Attach a structured payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// No service provides the requested action
    pub fn service_not_found(action: &str) -> Self {
        Self::new(format!("Service '{}' is not found.", action))
            .with_code(404)
            .with_kind(KIND_SERVICE_NOT_FOUND)
            .with_data(json!({ "action": action }))
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        ActionError::new(err.to_string())
    }
}

/// Broker lifecycle and registry errors
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Invalid broker configuration: {0}")]
    InvalidConfig(String),

    #[error("Action already registered: {0}")]
    DuplicateAction(String),

    #[error("Invalid service definition: {0}")]
    InvalidService(String),

    #[error("Broker failed to start: {0}")]
    Start(String),
}
