//! Host-independent inbound request and its query/payload decoding

use crate::error::{GatewayError, GatewayResult};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use switchyard_core::Params;

/// Default request body limit (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Request as handed to the pipeline by the HTTP host
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: http::Method,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// Build from request parts and a fully read body
    pub fn from_parts(parts: &http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            content_type: parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Attach a JSON body
    pub fn with_json(mut self, body: &Value) -> Self {
        self.content_type = Some("application/json".to_string());
        self.body = Bytes::from(body.to_string());
        self
    }

    /// Decoded query string
    pub fn query_params(&self) -> Params {
        self.query.as_deref().map(parse_urlencoded).unwrap_or_default()
    }

    /// Decoded payload. `None` for an empty body.
    pub fn payload(&self) -> GatewayResult<Option<Value>> {
        if self.body.is_empty() {
            return Ok(None);
        }

        let mime = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match mime.as_deref() {
            None | Some("application/json") => serde_json::from_slice(&self.body)
                .map(Some)
                .map_err(|_| {
                    GatewayError::InvalidRequestBody("Invalid request payload JSON format".to_string())
                }),
            Some(ct) if ct.ends_with("+json") => serde_json::from_slice(&self.body)
                .map(Some)
                .map_err(|_| {
                    GatewayError::InvalidRequestBody("Invalid request payload JSON format".to_string())
                }),
            Some("application/x-www-form-urlencoded") => {
                let text = std::str::from_utf8(&self.body).map_err(|_| {
                    GatewayError::InvalidRequestBody("Invalid request payload encoding".to_string())
                })?;
                Ok(Some(Value::Object(parse_urlencoded(text))))
            }
            Some(ct) if ct.starts_with("text/") => {
                Ok(Some(Value::String(String::from_utf8_lossy(&self.body).into_owned())))
            }
            Some(ct) => Err(GatewayError::UnsupportedMediaType(ct.to_string())),
        }
    }
}

/// Decode `a=1&b=2&a=3`. Repeated keys collect into an array.
pub fn parse_urlencoded(input: &str) -> Map<String, Value> {
    let mut params = Map::new();
    for (key, value) in url::form_urlencoded::parse(input.as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key.into_owned(), value);
            }
        }
    }
    params
}
