//! Gateway options and their validation
//!
//! Options arrive either from a config file (`GatewayConfig`) or through the
//! builder. Every alias is checked eagerly; the first bad alias aborts
//! registration with [`GatewayError::InvalidAlias`].

use crate::alias::{
    Alias, AliasMethod, AliasRouteOptions, CrudType, PreHook, RestRouteOptions, RouteOptions,
};
use crate::error::{GatewayError, GatewayResult};
use crate::mapping::{HttpMethod, RouteMethod};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use switchyard_core::{Broker, BrokerConfig, ServiceBroker};

/// Default service api name used for context action names
pub const DEFAULT_API_NAME: &str = "api";

/// Method field of an alias as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodSpec {
    One(String),
    Many(Vec<String>),
}

/// An alias as written in configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AliasSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist: Option<Vec<String>>,

    #[serde(default, rename = "routeOpts", skip_serializing_if = "Option::is_none")]
    pub route_opts: Option<Value>,

    #[serde(skip)]
    pub pre: Vec<PreHook>,
}

impl AliasSpec {
    /// Alias for explicit methods (`"GET"`, `"*"`, ...)
    pub fn new(method: &str, path: &str, action: &str) -> Self {
        Self {
            method: Some(MethodSpec::One(method.to_string())),
            path: Some(path.to_string()),
            action: Some(action.to_string()),
            ..Self::default()
        }
    }

    /// REST shorthand alias
    pub fn rest(path: &str, action: &str) -> Self {
        Self::new("REST", path, action)
    }

    /// Alias answering to several verbs
    pub fn methods(methods: &[&str], path: &str, action: &str) -> Self {
        Self {
            method: Some(MethodSpec::Many(methods.iter().map(|m| m.to_string()).collect())),
            ..Self::new("*", path, action)
        }
    }

    pub fn blacklist(mut self, types: &[&str]) -> Self {
        self.blacklist = Some(types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn route_opts(mut self, opts: Value) -> Self {
        self.route_opts = Some(opts);
        self
    }

    /// Attach a route-level hook run before dispatch
    pub fn pre<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut switchyard_core::Context) -> Result<(), switchyard_core::ActionError>
            + Send
            + Sync
            + 'static,
    {
        self.pre.push(Arc::new(hook));
        self
    }
}

impl fmt::Debug for AliasSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliasSpec")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("action", &self.action)
            .field("blacklist", &self.blacklist)
            .field("route_opts", &self.route_opts)
            .field("pre", &self.pre.len())
            .finish()
    }
}

/// Gateway options as loaded from a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker: Option<Value>,

    #[serde(default)]
    pub aliases: Vec<AliasSpec>,
}

impl GatewayConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> GatewayResult<Self> {
        serde_json::from_str(json).map_err(|e| GatewayError::InvalidOptions(e.to_string()))
    }

    /// Broker option described by the `broker` section (empty config when absent)
    pub fn broker_option(&self) -> GatewayResult<BrokerOption> {
        let config = match &self.broker {
            Some(value) => BrokerConfig::from_value(value.clone())?,
            None => BrokerConfig::default(),
        };
        Ok(BrokerOption::Config(config))
    }
}

/// Broker supplied to the gateway
#[derive(Clone)]
pub enum BrokerOption {
    /// A broker constructed by the caller
    Instance(Arc<dyn Broker>),
    /// Options to construct a [`ServiceBroker`] from
    Config(BrokerConfig),
}

impl BrokerOption {
    /// Resolve to the shared broker instance
    pub fn resolve(self) -> GatewayResult<Arc<dyn Broker>> {
        match self {
            BrokerOption::Instance(broker) => Ok(broker),
            BrokerOption::Config(config) => {
                let broker: Arc<dyn Broker> = ServiceBroker::try_new(config)?;
                Ok(broker)
            }
        }
    }
}

impl Default for BrokerOption {
    fn default() -> Self {
        BrokerOption::Config(BrokerConfig::default())
    }
}

impl fmt::Debug for BrokerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerOption::Instance(broker) => f
                .debug_tuple("Instance")
                .field(&broker.node_id())
                .finish(),
            BrokerOption::Config(config) => f.debug_tuple("Config").field(config).finish(),
        }
    }
}

/// Normalize the api name: trimmed, default when blank
pub fn api_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_API_NAME.to_string(),
    }
}

/// Validate every alias, in order
pub fn validate_aliases(specs: Vec<AliasSpec>) -> GatewayResult<Vec<Alias>> {
    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| validate_alias(index, spec))
        .collect()
}

/// Validate one alias
pub fn validate_alias(index: usize, spec: AliasSpec) -> GatewayResult<Alias> {
    let method = parse_method(index, spec.method.as_ref())?;

    let path = spec
        .path
        .ok_or_else(|| GatewayError::alias(index, "\"path\" is required"))?;
    if !path.starts_with('/') {
        return Err(GatewayError::alias(
            index,
            format!("\"path\" must begin with /: {}", path),
        ));
    }

    let action = spec
        .action
        .filter(|action| !action.trim().is_empty())
        .ok_or_else(|| GatewayError::alias(index, "\"action\" is required"))?;

    let blacklist = match (spec.blacklist, &method) {
        (None, _) => BTreeSet::new(),
        (Some(items), AliasMethod::Rest) => parse_blacklist(index, &items)?,
        (Some(_), AliasMethod::Route(_)) => {
            return Err(GatewayError::alias(
                index,
                "\"blacklist\" is only allowed with method REST",
            ))
        }
    };

    let route_opts = match spec.route_opts {
        None | Some(Value::Null) => match method {
            AliasMethod::Rest => AliasRouteOptions::Rest(RestRouteOptions::default()),
            AliasMethod::Route(_) => AliasRouteOptions::default(),
        },
        Some(Value::Object(map)) => match method {
            AliasMethod::Rest => AliasRouteOptions::Rest(parse_rest_options(index, map)?),
            AliasMethod::Route(_) => AliasRouteOptions::Plain(RouteOptions::from(map)),
        },
        Some(_) => return Err(GatewayError::alias(index, "\"routeOpts\" must be an object")),
    };

    Ok(Alias {
        method,
        path,
        action,
        blacklist,
        route_opts,
        pre: spec.pre,
    })
}

fn parse_method(index: usize, spec: Option<&MethodSpec>) -> GatewayResult<AliasMethod> {
    let verbs = match spec {
        None => return Ok(AliasMethod::Route(RouteMethod::Any)),
        Some(MethodSpec::One(method)) => match method.to_uppercase().as_str() {
            "REST" => return Ok(AliasMethod::Rest),
            "*" => return Ok(AliasMethod::Route(RouteMethod::Any)),
            _ => vec![method.clone()],
        },
        Some(MethodSpec::Many(methods)) => methods.clone(),
    };

    if verbs.is_empty() {
        return Err(GatewayError::alias(index, "\"method\" must not be empty"));
    }

    let mut parsed: Vec<HttpMethod> = Vec::with_capacity(verbs.len());
    for verb in &verbs {
        let method = HttpMethod::parse(verb).ok_or_else(|| {
            GatewayError::alias(index, format!("\"method\" has an unsupported value: {}", verb))
        })?;
        if !parsed.contains(&method) {
            parsed.push(method);
        }
    }

    Ok(AliasMethod::Route(RouteMethod::Verbs(parsed)))
}

fn parse_blacklist(index: usize, items: &[String]) -> GatewayResult<BTreeSet<CrudType>> {
    let mut blacklist = BTreeSet::new();
    for item in items {
        let crud = CrudType::parse(item).ok_or_else(|| {
            GatewayError::alias(index, format!("\"blacklist\" has an unknown type: {}", item))
        })?;
        if !blacklist.insert(crud) {
            return Err(GatewayError::alias(
                index,
                format!("\"blacklist\" contains a duplicate value: {}", item),
            ));
        }
    }
    Ok(blacklist)
}

fn parse_rest_options(index: usize, map: Map<String, Value>) -> GatewayResult<RestRouteOptions> {
    let mut rest = RestRouteOptions::default();
    for (key, value) in map {
        let slot = rest.slot_mut(&key).ok_or_else(|| {
            GatewayError::alias(index, format!("\"routeOpts.{}\" is not allowed", key))
        })?;
        *slot = match value {
            Value::Object(opts) => Some(RouteOptions::from(opts)),
            Value::Null => None,
            _ => {
                return Err(GatewayError::alias(
                    index,
                    format!("\"routeOpts.{}\" must be an object", key),
                ))
            }
        };
    }
    Ok(rest)
}
