//! Broker collaborator types for the switchyard gateway.
//!
//! This crate provides the action-based RPC side of the gateway:
//! - The `Broker` trait the gateway dispatches through
//! - Per-call dispatch `Context` (caller identity, params, meta)
//! - Structured `ActionError`s carrying an optional status code
//! - An in-process `ServiceBroker` with a service/action registry

pub mod broker;
pub mod context;
pub mod error;
pub mod service;

pub use broker::{Broker, BrokerConfig, ServiceBroker};
pub use context::{ActionDescriptor, Context, Meta, Params};
pub use error::{ActionError, BrokerError};
pub use service::{ActionFuture, ActionHandler, ActionResult, Service};
