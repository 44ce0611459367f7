//! Route table command

use super::load_config;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use switchyard_gateway::{GatewayBuilder, RouteInfo};

#[derive(Args, Debug)]
pub struct RoutesArgs {
    /// Gateway config file (JSON, or YAML by .yaml/.yml extension)
    pub config: PathBuf,

    /// Print the table as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RoutesArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let gateway = GatewayBuilder::from_config(config)?.build().await?;
    let routes = gateway.routes();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&routes)?);
    } else {
        print!("{}", render_table(&routes));
    }
    Ok(())
}

fn render_table(routes: &[RouteInfo]) -> String {
    let method_width = routes.iter().map(|r| r.method.len()).max().unwrap_or(0).max(6);
    let path_width = routes.iter().map(|r| r.path.len()).max().unwrap_or(0).max(4);

    let mut out = format!("{:<mw$}  {:<pw$}  ACTION\n", "METHOD", "PATH", mw = method_width, pw = path_width);
    for route in routes {
        out.push_str(&format!(
            "{:<mw$}  {:<pw$}  {}\n",
            route.method,
            route.path,
            route.action,
            mw = method_width,
            pw = path_width
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_gateway::RouteOptions;

    #[test]
    fn test_render_table() {
        let routes = vec![
            RouteInfo {
                method: "GET".to_string(),
                path: "/users".to_string(),
                action: "user.list".to_string(),
                options: RouteOptions::new(),
            },
            RouteInfo {
                method: "DELETE".to_string(),
                path: "/users/{id}".to_string(),
                action: "user.remove".to_string(),
                options: RouteOptions::new(),
            },
        ];

        let table = render_table(&routes);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("METHOD  PATH"));
        assert_eq!(lines[2], "DELETE  /users/{id}  user.remove");
    }
}
