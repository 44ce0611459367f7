//! Alias model and the REST alias normalizer
//!
//! A REST alias expands into the five CRUD routes:
//!
//! | crud type | method | path        |
//! |-----------|--------|-------------|
//! | list      | GET    | `path`      |
//! | get       | GET    | `path/{id}` |
//! | create    | POST   | `path`      |
//! | update    | PUT    | `path/{id}` |
//! | remove    | DELETE | `path/{id}` |
//!
//! Routes with an `{id}` segment get an identifier validation rule injected
//! into their options before the alias' own options are merged on top.

use crate::mapping::{HttpMethod, RouteMethod};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use switchyard_core::{ActionError, Context};

/// Route-level hook run after parameters are merged and before dispatch
pub type PreHook = Arc<dyn Fn(&mut Context) -> Result<(), ActionError> + Send + Sync>;

/// Canonical REST expansion types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrudType {
    List,
    Get,
    Create,
    Update,
    Remove,
}

/// All CRUD types, in expansion order
pub const CRUD_TYPES: [CrudType; 5] = [
    CrudType::List,
    CrudType::Get,
    CrudType::Create,
    CrudType::Update,
    CrudType::Remove,
];

impl CrudType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "list" => Some(CrudType::List),
            "get" => Some(CrudType::Get),
            "create" => Some(CrudType::Create),
            "update" => Some(CrudType::Update),
            "remove" => Some(CrudType::Remove),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrudType::List => "list",
            CrudType::Get => "get",
            CrudType::Create => "create",
            CrudType::Update => "update",
            CrudType::Remove => "remove",
        }
    }

    pub fn http_method(&self) -> HttpMethod {
        match self {
            CrudType::List | CrudType::Get => HttpMethod::Get,
            CrudType::Create => HttpMethod::Post,
            CrudType::Update => HttpMethod::Put,
            CrudType::Remove => HttpMethod::Delete,
        }
    }

    /// Whether the route addresses a single resource by `{id}`
    pub fn has_id(&self) -> bool {
        matches!(self, CrudType::Get | CrudType::Update | CrudType::Remove)
    }
}

impl fmt::Display for CrudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque route options, merged by shallow key overwrite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteOptions(Map<String, Value>);

impl RouteOptions {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Overwrite keys of `self` with the keys of `other`
    pub fn merge(&mut self, other: &RouteOptions) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Builder form of [`RouteOptions::merge`]
    pub fn merged(mut self, other: Option<&RouteOptions>) -> Self {
        if let Some(other) = other {
            self.merge(other);
        }
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RouteOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Per-type options of a REST alias
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestRouteOptions {
    pub all: Option<RouteOptions>,
    pub list: Option<RouteOptions>,
    pub get: Option<RouteOptions>,
    pub create: Option<RouteOptions>,
    pub update: Option<RouteOptions>,
    pub remove: Option<RouteOptions>,
}

impl RestRouteOptions {
    pub fn for_type(&self, crud: CrudType) -> Option<&RouteOptions> {
        match crud {
            CrudType::List => self.list.as_ref(),
            CrudType::Get => self.get.as_ref(),
            CrudType::Create => self.create.as_ref(),
            CrudType::Update => self.update.as_ref(),
            CrudType::Remove => self.remove.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, key: &str) -> Option<&mut Option<RouteOptions>> {
        match key {
            "all" => Some(&mut self.all),
            _ => match CrudType::parse(key)? {
                CrudType::List => Some(&mut self.list),
                CrudType::Get => Some(&mut self.get),
                CrudType::Create => Some(&mut self.create),
                CrudType::Update => Some(&mut self.update),
                CrudType::Remove => Some(&mut self.remove),
            },
        }
    }
}

/// Route options as declared on an alias
#[derive(Debug, Clone, PartialEq)]
pub enum AliasRouteOptions {
    Plain(RouteOptions),
    Rest(RestRouteOptions),
}

impl Default for AliasRouteOptions {
    fn default() -> Self {
        AliasRouteOptions::Plain(RouteOptions::new())
    }
}

/// Alias method after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasMethod {
    /// REST shorthand for the five CRUD routes
    Rest,
    Route(RouteMethod),
}

/// A validated alias
#[derive(Clone)]
pub struct Alias {
    pub method: AliasMethod,
    pub path: String,
    pub action: String,
    pub blacklist: BTreeSet<CrudType>,
    pub route_opts: AliasRouteOptions,
    pub pre: Vec<PreHook>,
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alias")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("action", &self.action)
            .field("blacklist", &self.blacklist)
            .field("route_opts", &self.route_opts)
            .field("pre", &self.pre.len())
            .finish()
    }
}

/// A concrete route derived from an alias
#[derive(Clone)]
pub struct NormalizedRoute {
    pub method: RouteMethod,
    pub path: String,
    pub action: String,
    pub route_opts: RouteOptions,
    pub pre: Vec<PreHook>,
}

impl fmt::Debug for NormalizedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("action", &self.action)
            .field("route_opts", &self.route_opts)
            .field("pre", &self.pre.len())
            .finish()
    }
}

/// Validation options injected for routes addressing a resource by id
pub fn id_validation() -> Value {
    json!({
        "params": {
            "type": "object",
            "properties": { "id": { "type": ["string", "number"] } },
            "required": ["id"],
            "additionalProperties": false
        }
    })
}

/// Resolve one CRUD route of a REST alias
pub fn normalize(crud: CrudType, alias: &Alias) -> NormalizedRoute {
    let mut path = alias.path.clone();
    let mut route_opts = RouteOptions::new();

    if crud.has_id() {
        path = format!("{}/{{id}}", path.trim_end_matches('/'));
        route_opts = route_opts.with("validate", id_validation());
    }

    let route_opts = match &alias.route_opts {
        AliasRouteOptions::Rest(rest) => route_opts
            .merged(rest.all.as_ref())
            .merged(rest.for_type(crud)),
        AliasRouteOptions::Plain(plain) => route_opts.merged(Some(plain)),
    };

    NormalizedRoute {
        method: RouteMethod::single(crud.http_method()),
        path,
        action: format!("{}.{}", alias.action, crud),
        route_opts,
        pre: alias.pre.clone(),
    }
}

/// CRUD types a REST alias registers routes for
pub fn rest_actions(alias: &Alias) -> Vec<CrudType> {
    CRUD_TYPES
        .iter()
        .copied()
        .filter(|crud| !alias.blacklist.contains(crud))
        .collect()
}

/// Expand an alias into its concrete routes
pub fn expand(alias: &Alias) -> Vec<NormalizedRoute> {
    match &alias.method {
        AliasMethod::Rest => rest_actions(alias)
            .into_iter()
            .map(|crud| normalize(crud, alias))
            .collect(),
        AliasMethod::Route(method) => {
            let route_opts = match &alias.route_opts {
                AliasRouteOptions::Plain(plain) => plain.clone(),
                AliasRouteOptions::Rest(rest) => rest.all.clone().unwrap_or_default(),
            };
            vec![NormalizedRoute {
                method: method.clone(),
                path: alias.path.clone(),
                action: alias.action.clone(),
                route_opts,
                pre: alias.pre.clone(),
            }]
        }
    }
}
