//! fleetgate - GPU inference control plane

use clap::Parser;
use fleetgate::{Config, ControlPlane};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fleetgate", version, about = "GPU inference control plane")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, env = "FLEETGATE_CONFIG")]
    config: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = match Config::load(args.config.as_deref()).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let control_plane = match ControlPlane::new(config).await {
        Ok(cp) => cp,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match control_plane.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
