pub mod routes;
pub mod serve;

use anyhow::{Context, Result};
use std::path::Path;
use switchyard_gateway::GatewayConfig;

/// Load gateway options from a JSON or YAML file, picked by extension
pub fn load_config(path: &Path) -> Result<GatewayConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    let config = if yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?
    } else {
        GatewayConfig::from_json(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?
    };
    Ok(config)
}
