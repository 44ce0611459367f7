//! CLI for the switchyard gateway.
//!
//! Provides commands for:
//! - routes: Print the route table compiled from a config file
//! - serve: Run the gateway over a config-built broker

mod commands;

use clap::{Parser, Subcommand};
use commands::{routes, serve};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "HTTP gateway for switchyard brokers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compiled route table
    Routes(routes::RoutesArgs),
    /// Serve the gateway over HTTP
    Serve(serve::ServeArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Routes(args) => routes::run(args).await,
        Commands::Serve(args) => serve::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(match e.to_string().as_str() {
            s if s.contains("Invalid gateway options") || s.contains("Conflicting route") => 2,
            s if s.contains("address") || s.contains("bind") => 3,
            _ => 1,
        });
    }
}
