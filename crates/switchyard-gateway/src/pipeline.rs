//! Ordered request pipeline
//!
//! Per routed request: pre-auth (context built), validation, pre-handler
//! (params merged), route `pre` hooks, dispatch, translation. Each stage
//! completes before the next starts. A failure at any stage skips straight to
//! translation; nothing is retried.

use crate::compiler::{CompiledRoute, RouteInfo};
use crate::context::ContextBuilder;
use crate::error::GatewayError;
use crate::request::InboundRequest;
use crate::response::{translate, Outcome, Reply};
use switchyard_core::Params;
use tracing::debug;

/// Compiled routes plus the per-request hooks
pub struct Pipeline {
    routes: Vec<CompiledRoute>,
    contexts: ContextBuilder,
}

impl Pipeline {
    pub fn new(routes: Vec<CompiledRoute>, contexts: ContextBuilder) -> Self {
        Self { routes, contexts }
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Route table, in registration order
    pub fn route_table(&self) -> Vec<RouteInfo> {
        self.routes.iter().map(CompiledRoute::info).collect()
    }

    /// Run a request the host matched to `route` and translate the outcome
    pub async fn handle(&self, route: &CompiledRoute, path_params: Params, req: InboundRequest) -> Reply {
        translate(self.run(route, path_params, req).await)
    }

    /// Translate a failure raised by the host before the pipeline ran
    pub fn reject(&self, err: GatewayError) -> Reply {
        translate(Err(err))
    }

    async fn run(&self, route: &CompiledRoute, mut path_params: Params, req: InboundRequest) -> Outcome {
        debug!("{} {} matched {}", req.method, req.path, route.action);

        let mut ctx = self.contexts.on_pre_auth(&req.method, &path_params);

        let mut query = req.query_params();
        let mut payload = req.payload()?;
        if let Some(rules) = &route.validation {
            rules.apply(&mut path_params, &mut query, &mut payload)?;
        }

        self.contexts
            .on_pre_handler(&mut ctx, payload.as_ref(), &path_params, &query);

        for hook in &route.pre {
            hook(&mut ctx)?;
        }

        let reply = route.invoke(ctx).await?;
        Ok(reply)
    }
}
