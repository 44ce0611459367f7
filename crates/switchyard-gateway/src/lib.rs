//! HTTP gateway for switchyard brokers.
//!
//! This crate maps HTTP requests onto broker actions. It supports:
//! - Alias declarations (single verb, verb lists, `*` and `REST` shorthands)
//! - REST expansion into list/get/create/update/remove routes with blacklists
//! - Per-route options and `id` validation on generated id routes
//! - Request contexts with merged params (payload < path params < query)
//! - JSON Schema validation of params, query and payload
//! - Error envelopes (`statusCode`, `error`, `message`, `data`)
//! - An axum host adapter registering each route with its method filter

pub mod alias;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod router;
pub mod validation;

pub use alias::{Alias, AliasMethod, CrudType, NormalizedRoute, PreHook, RouteOptions};
pub use compiler::{CompiledRoute, RouteCompiler, RouteInfo};
pub use config::{AliasSpec, BrokerOption, GatewayConfig};
pub use context::ContextBuilder;
pub use error::{ErrorEnvelope, GatewayError, GatewayResult};
pub use mapping::{HttpMethod, RouteMethod, UrlTemplate};
pub use pipeline::Pipeline;
pub use request::InboundRequest;
pub use response::{Reply, ReplyBody};
pub use router::{Gateway, GatewayBuilder};
pub use validation::ValidationRules;
