//! Request validation driven by the `validate` route option
//!
//! Each section is a JSON Schema compiled once when the route is compiled:
//!
//! ```json
//! { "validate": {
//!     "params": { "type": "object", "properties": { "id": { "type": ["string", "number"] } }, "required": ["id"] },
//!     "query":  { "type": "object", "properties": { "name": { "type": "string", "default": "Felipe" } } }
//! } }
//! ```
//!
//! Path and query values always arrive as strings. Before a section is
//! checked, string values of declared properties are converted to the first
//! listed `type` they parse as (`string` listed first keeps them as-is), and
//! `default`s of absent properties are filled in.

use crate::alias::RouteOptions;
use crate::error::{GatewayError, GatewayResult, ValidationSource};
use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;
use switchyard_core::Params;

/// Route option key holding validation rules
pub const VALIDATE_KEY: &str = "validate";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRules {
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    query: Option<Value>,
    #[serde(default)]
    payload: Option<Value>,
}

/// Compiled schema for one request part
#[derive(Clone)]
pub struct SectionSchema {
    schema: Value,
    validator: Arc<Validator>,
}

impl SectionSchema {
    fn compile(location: ValidationSource, schema: Value) -> GatewayResult<Self> {
        let validator = jsonschema::validator_for(&schema).map_err(|e| {
            GatewayError::InvalidOptions(format!("invalid \"validate.{}\" schema: {}", location, e))
        })?;
        Ok(Self {
            schema,
            validator: Arc::new(validator),
        })
    }

    /// Convert string values and fill defaults of declared properties
    fn prepare(&self, input: &mut Map<String, Value>) {
        let Some(Value::Object(properties)) = self.schema.get("properties") else {
            return;
        };

        for (name, property) in properties {
            match input.get_mut(name) {
                Some(value) => {
                    if let Some(converted) = coerce(property, value) {
                        *value = converted;
                    }
                }
                None => {
                    if let Some(default) = property.get("default") {
                        input.insert(name.clone(), default.clone());
                    }
                }
            }
        }
    }

    fn check(&self, location: ValidationSource, instance: &Value) -> GatewayResult<()> {
        let reasons: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Validation {
                location,
                reason: reasons.join("; "),
            })
        }
    }

    fn apply(&self, location: ValidationSource, input: &mut Map<String, Value>) -> GatewayResult<()> {
        self.prepare(input);
        let instance = Value::Object(std::mem::take(input));
        let outcome = self.check(location, &instance);
        if let Value::Object(map) = instance {
            *input = map;
        }
        outcome
    }
}

impl fmt::Debug for SectionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SectionSchema").field(&self.schema).finish()
    }
}

/// Convert a string to the first listed schema type it parses as
fn coerce(property: &Value, value: &Value) -> Option<Value> {
    let Value::String(s) = value else {
        return None;
    };

    let types: Vec<&str> = match property.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };

    types.into_iter().find_map(|t| match t {
        "string" => Some(value.clone()),
        "integer" => s.trim().parse::<i64>().ok().map(|n| Value::Number(n.into())),
        "number" => parse_number(s),
        "boolean" => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    })
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(int) = s.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Validation rules of a route
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    pub params: Option<SectionSchema>,
    pub query: Option<SectionSchema>,
    pub payload: Option<SectionSchema>,
}

impl ValidationRules {
    /// Compile rules from route options. `Ok(None)` when the route declares none.
    pub fn from_options(opts: &RouteOptions) -> GatewayResult<Option<Self>> {
        let raw: RawRules = match opts.get(VALIDATE_KEY) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| GatewayError::InvalidOptions(format!("invalid \"validate\" option: {}", e)))?,
        };

        let section = |location, schema: Option<Value>| match schema {
            None | Some(Value::Null) => Ok(None),
            Some(schema) => SectionSchema::compile(location, schema).map(Some),
        };

        Ok(Some(Self {
            params: section(ValidationSource::Params, raw.params)?,
            query: section(ValidationSource::Query, raw.query)?,
            payload: section(ValidationSource::Payload, raw.payload)?,
        }))
    }

    /// Validate and normalize the request parts in place
    pub fn apply(
        &self,
        params: &mut Params,
        query: &mut Params,
        payload: &mut Option<Value>,
    ) -> GatewayResult<()> {
        if let Some(schema) = &self.params {
            schema.apply(ValidationSource::Params, params)?;
        }
        if let Some(schema) = &self.query {
            schema.apply(ValidationSource::Query, query)?;
        }
        if let Some(schema) = &self.payload {
            match payload {
                Some(Value::Object(fields)) => schema.apply(ValidationSource::Payload, fields)?,
                Some(other) => schema.check(ValidationSource::Payload, other)?,
                None => {
                    let mut fields = Map::new();
                    schema.apply(ValidationSource::Payload, &mut fields)?;
                    *payload = Some(Value::Object(fields));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::id_validation;
    use serde_json::json;

    fn rules(value: Value) -> ValidationRules {
        let opts = RouteOptions::new().with(VALIDATE_KEY, value);
        ValidationRules::from_options(&opts).unwrap().unwrap()
    }

    fn map(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    fn object(properties: Value) -> Value {
        json!({ "type": "object", "properties": properties })
    }

    #[test]
    fn test_id_rule_accepts_string_first() {
        let rules = rules(id_validation());
        let mut params = map(json!({ "id": "42" }));
        rules.apply(&mut params, &mut Params::new(), &mut None).unwrap();
        // string is listed first, so the value is kept as-is
        assert_eq!(params["id"], json!("42"));
    }

    #[test]
    fn test_id_rule_rejects_missing_and_extra() {
        let rules = rules(id_validation());

        let err = rules
            .apply(&mut Params::new(), &mut Params::new(), &mut None)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation { location: ValidationSource::Params, .. }));

        let mut params = map(json!({ "id": "1", "other": "x" }));
        assert!(rules.apply(&mut params, &mut Params::new(), &mut None).is_err());
    }

    #[test]
    fn test_number_coercion() {
        let rules = rules(json!({ "query": object(json!({ "limit": { "type": "number" } })) }));
        let mut query = map(json!({ "limit": "10" }));
        rules.apply(&mut Params::new(), &mut query, &mut None).unwrap();
        assert_eq!(query["limit"], json!(10));

        let mut query = map(json!({ "limit": "ten" }));
        let err = rules.apply(&mut Params::new(), &mut query, &mut None).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_required_query_field() {
        let rules = rules(json!({ "query": {
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        } }));
        let err = rules
            .apply(&mut Params::new(), &mut Params::new(), &mut None)
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(matches!(err, GatewayError::Validation { location: ValidationSource::Query, .. }));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_default_applied() {
        let rules = rules(json!({ "query": object(json!({ "name": { "type": "string", "default": "Felipe" } })) }));
        let mut query = Params::new();
        rules.apply(&mut Params::new(), &mut query, &mut None).unwrap();
        assert_eq!(query["name"], json!("Felipe"));
    }

    #[test]
    fn test_additional_properties_rejected() {
        let rules = rules(json!({ "query": {
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "additionalProperties": false
        } }));
        let mut query = map(json!({ "other": "x" }));
        assert!(rules.apply(&mut Params::new(), &mut query, &mut None).is_err());
    }

    #[test]
    fn test_payload_rules() {
        let rules = rules(json!({ "payload": {
            "type": "object",
            "properties": { "active": { "type": "boolean" } },
            "required": ["active"]
        } }));

        let mut payload = Some(json!({ "active": "true" }));
        rules.apply(&mut Params::new(), &mut Params::new(), &mut payload).unwrap();
        assert_eq!(payload, Some(json!({ "active": true })));

        let mut payload = Some(json!("text"));
        assert!(rules.apply(&mut Params::new(), &mut Params::new(), &mut payload).is_err());

        let mut payload = None;
        assert!(rules.apply(&mut Params::new(), &mut Params::new(), &mut payload).is_err());
    }

    #[test]
    fn test_from_options() {
        let opts = RouteOptions::new().with("description", json!("x"));
        assert!(ValidationRules::from_options(&opts).unwrap().is_none());

        let opts = RouteOptions::new().with(VALIDATE_KEY, json!({ "headers": {} }));
        assert!(ValidationRules::from_options(&opts).is_err());

        let opts = RouteOptions::new().with(VALIDATE_KEY, json!({ "query": { "type": "date" } }));
        assert!(ValidationRules::from_options(&opts).is_err());
    }
}
