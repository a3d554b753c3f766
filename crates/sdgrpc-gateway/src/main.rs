//! sdgrpc Gateway CLI
//!
//! Starts the native gRPC and gRPC-Web servers over one engine manager.

use clap::Parser;
use sdgrpc_gateway::{logging, start, Cli, GatewayError};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        error!(error = %e, "Gateway terminated");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), GatewayError> {
    let config = cli.load_config()?;

    let never = start(config).await?;
    match never {}
}
