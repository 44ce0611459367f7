//! Serve command

use super::load_config;
use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use switchyard_gateway::GatewayBuilder;
use tracing::info;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Gateway config file (JSON, or YAML by .yaml/.yml extension)
    pub config: PathBuf,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    pub addr: String,

    /// Request body limit in bytes
    #[arg(long, default_value = "1048576")]
    pub max_payload_bytes: usize,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let addr: SocketAddr = args
        .addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.addr))?;

    let config = load_config(&args.config)?;
    let gateway = GatewayBuilder::from_config(config)?
        .max_payload_bytes(args.max_payload_bytes)
        .build()
        .await?;

    for route in gateway.routes() {
        info!("{} {} -> {}", route.method, route.path, route.action);
    }

    gateway
        .serve(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    Ok(())
}
