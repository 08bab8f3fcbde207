//! # Fleetgate
//!
//! Multi-tenant control plane for a GPU inference fleet. Accepts
//! OpenAI-compatible inference requests, authenticates and rate-limits
//! them, schedules across healthy backend workers, proxies unary and
//! streamed responses, and accounts for token usage. The same process
//! runs the worker fleet control loop: deployment reconciliation, launch
//! orchestration with live progress, three-signal health evaluation, and
//! graceful retirement on spot-termination warnings.
//!
//! ## Running
//!
//! ```rust,no_run
//! use fleetgate::{Config, ControlPlane};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Some("config/fleetgate.yaml")).await?;
//!     let control_plane = ControlPlane::new(config).await?;
//!     control_plane.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod core;
pub mod server;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use utils::error::{FleetError, Result};

use tracing::info;

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The assembled control plane
pub struct ControlPlane {
    server: server::HttpServer,
}

impl ControlPlane {
    /// Create a control plane instance
    pub async fn new(config: Config) -> Result<Self> {
        info!("Creating control plane instance");
        let server = server::HttpServer::new(config).await?;
        Ok(Self { server })
    }

    /// Run the control plane until shutdown
    pub async fn run(self) -> Result<()> {
        info!("Starting fleetgate v{}", VERSION);
        self.server.start().await
    }
}
