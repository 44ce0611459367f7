//! Error types and the client-facing error envelope

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use switchyard_core::{ActionError, BrokerError};
use thiserror::Error;

/// Request part a validation failure was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSource {
    Params,
    Query,
    Payload,
}

impl ValidationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationSource::Params => "params",
            ValidationSource::Query => "query",
            ValidationSource::Payload => "payload",
        }
    }
}

impl fmt::Display for ValidationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid gateway options: aliases[{index}]: {reason}")]
    InvalidAlias { index: usize, reason: String },

    #[error("Invalid gateway options: {0}")]
    InvalidOptions(String),

    #[error("Conflicting route: {method} {path}")]
    RouteConflict { method: String, path: String },

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Invalid request {location} input: {reason}")]
    Validation {
        location: ValidationSource,
        reason: String,
    },

    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    #[error("Payload content length greater than maximum allowed: {0}")]
    PayloadTooLarge(usize),

    #[error("Unsupported Media Type: {0}")]
    UnsupportedMediaType(String),

    #[error(transparent)]
    Dispatch(#[from] ActionError),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub(crate) fn alias(index: usize, reason: impl Into<String>) -> Self {
        GatewayError::InvalidAlias {
            index,
            reason: reason.into(),
        }
    }

    /// Whether this error aborts registration rather than a single request
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidAlias { .. }
                | GatewayError::InvalidOptions(_)
                | GatewayError::RouteConflict { .. }
                | GatewayError::Broker(_)
        )
    }

    /// Convert to the client-facing envelope
    pub fn to_envelope(&self) -> ErrorEnvelope {
        match self {
            GatewayError::RouteNotFound(_) => ErrorEnvelope::new(404, "Not Found"),
            GatewayError::Validation { location, reason } => ErrorEnvelope::new(
                400,
                format!("Invalid request {} input", location),
            )
            .with_data(json!({ "source": location.as_str(), "reason": reason })),
            GatewayError::InvalidRequestBody(msg) => ErrorEnvelope::new(400, msg.clone()),
            GatewayError::PayloadTooLarge(_) => ErrorEnvelope::new(413, self.to_string()),
            GatewayError::UnsupportedMediaType(_) => ErrorEnvelope::new(415, "Unsupported Media Type"),
            GatewayError::Dispatch(err) => ErrorEnvelope::from_action_error(err),
            _ => ErrorEnvelope::new(500, self.to_string()),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.to_envelope().status_code
    }
}

/// Error body sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "statusCode")]
    pub status_code: u16,

    /// Reason phrase for `status_code`
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorEnvelope {
    /// Create an envelope. Codes outside 400-599 become 500.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        let status_code = if (400..=599).contains(&status_code) {
            status_code
        } else {
            500
        };

        Self {
            status_code,
            error: status_label(status_code).to_string(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Build from a dispatch failure. Failures without a code become 500.
    pub fn from_action_error(err: &ActionError) -> Self {
        let envelope = ErrorEnvelope::new(err.code.unwrap_or(500), err.message.clone());
        match (&err.code, &err.data) {
            (Some(_), Some(data)) => envelope.with_data(data.clone()),
            _ => envelope,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Reason phrase for a status code
pub fn status_label(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown")
}
