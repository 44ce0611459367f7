//! Response and error translation
//!
//! The last pipeline stage. Successful replies pass through untouched, failures
//! of any stage become an [`ErrorEnvelope`]. Translation itself cannot fail.

use crate::error::{ErrorEnvelope, GatewayError};
use http::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

/// Body of a reply
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    Text(String),
    Json(Value),
}

/// Host-independent HTTP reply
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: ReplyBody,
}

impl Reply {
    /// 200 with an empty body
    pub fn empty() -> Self {
        Self {
            status: StatusCode::OK,
            body: ReplyBody::Empty,
        }
    }

    /// Reply for an action result. No value (or null) becomes an empty 200.
    pub fn from_result(result: Option<Value>) -> Self {
        let body = match result {
            None | Some(Value::Null) => ReplyBody::Empty,
            Some(Value::String(text)) => ReplyBody::Text(text),
            Some(value) => ReplyBody::Json(value),
        };
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// Reply carrying an error envelope
    pub fn from_envelope(envelope: &ErrorEnvelope) -> Self {
        let body = serde_json::to_value(envelope).unwrap_or_else(|_| {
            json!({
                "statusCode": envelope.status_code,
                "error": envelope.error,
                "message": envelope.message,
            })
        });
        Self {
            status: envelope.status(),
            body: ReplyBody::Json(body),
        }
    }
}

/// Result of running a request through the pipeline
pub type Outcome = Result<Reply, GatewayError>;

/// Turn a pipeline outcome into the reply sent to the client
pub fn translate(outcome: Outcome) -> Reply {
    match outcome {
        Ok(reply) => reply,
        Err(err) => {
            let envelope = err.to_envelope();
            match envelope.status_code {
                500..=599 => error!("Request failed: {}", err),
                404 => debug!("Routing miss or missing action: {}", err),
                _ => warn!("Request rejected: {}", err),
            }
            Reply::from_envelope(&envelope)
        }
    }
}
