//! Configuration model definitions
//!
//! Each concern has its own file; all models use serde defaults so partial
//! YAML files stay valid.

mod auth;
mod meter;
mod monitor;
mod orchestrator;
mod proxy;
mod rate_limit;
mod reconciler;
mod scheduler;
mod server;
mod storage;

pub use auth::AuthConfig;
pub use meter::MeterConfig;
pub use monitor::MonitorConfig;
pub use orchestrator::OrchestratorConfig;
pub use proxy::ProxyConfig;
pub use rate_limit::RateLimitsConfig;
pub use reconciler::ReconcilerConfig;
pub use scheduler::{SchedulerConfig, SchedulingStrategy};
pub use server::{CorsConfig, ServerConfig};
pub use storage::{DatabaseConfig, RedisConfig, StorageConfig};
