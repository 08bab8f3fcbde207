//! Configuration for the control plane
//!
//! Configuration is loaded from a YAML file with environment-variable
//! overrides applied on top; every section carries serde defaults so a
//! missing file still yields a runnable configuration.

pub mod models;

pub use models::{
    AuthConfig, CorsConfig, DatabaseConfig, MeterConfig, MonitorConfig, OrchestratorConfig,
    ProxyConfig, RateLimitsConfig, ReconcilerConfig, RedisConfig, SchedulerConfig,
    SchedulingStrategy, ServerConfig, StorageConfig,
};

use crate::utils::error::{FleetError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, warn};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,
    /// Persistent storage
    #[serde(default)]
    pub storage: StorageConfig,
    /// Admin and key authentication
    #[serde(default)]
    pub auth: AuthConfig,
    /// Layered rate limits
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    /// Worker scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Inference proxy
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Launch orchestration
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Health monitoring
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Deployment reconciliation
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    /// Usage metering
    #[serde(default)]
    pub meter: MeterConfig,
}

impl Config {
    /// Load configuration from a YAML file, then apply env overrides
    pub async fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(file_path) => match tokio::fs::read_to_string(file_path).await {
                Ok(content) => serde_yaml::from_str(&content).map_err(|e| {
                    FleetError::Config(format!("Failed to parse config file {}: {}", file_path, e))
                })?,
                Err(e) => {
                    warn!("Failed to read config file {}: {}", file_path, e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        debug!("Configuration loaded");
        Ok(config)
    }

    /// Apply environment-variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = env::var("FLEETGATE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("FLEETGATE_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| FleetError::Config(format!("Invalid FLEETGATE_PORT: {}", e)))?;
        }
        if let Ok(db_url) = env::var("DATABASE_URL") {
            self.storage.database.url = db_url;
        }
        if let Ok(redis_url) = env::var("REDIS_URL") {
            self.storage.redis.url = redis_url;
        }
        if let Ok(token) = env::var("FLEETGATE_ADMIN_TOKEN") {
            self.auth.admin_token = token;
        }
        if let Ok(tool) = env::var("FLEETGATE_LAUNCH_TOOL") {
            self.orchestrator.launch_tool = tool;
        }
        Ok(())
    }

    /// Cross-field validation, run once at startup
    pub fn validate(&self) -> Result<()> {
        self.server.validate().map_err(FleetError::Config)?;
        self.auth.validate().map_err(FleetError::Config)?;
        self.rate_limits.validate().map_err(FleetError::Config)?;
        self.scheduler.validate().map_err(FleetError::Config)?;
        self.proxy.validate().map_err(FleetError::Config)?;
        self.orchestrator.validate().map_err(FleetError::Config)?;
        self.monitor.validate().map_err(FleetError::Config)?;
        self.reconciler.validate().map_err(FleetError::Config)?;
        self.meter.validate().map_err(FleetError::Config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r#"
server:
  port: 9100
rate_limits:
  global_rps: 500
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.rate_limits.global_rps, 500);
        assert_eq!(config.scheduler.health_threshold, 50);
        assert_eq!(config.monitor.heartbeat_staleness, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nonsensical_quota_is_rejected() {
        let yaml = "rate_limits:\n  global_rps: 0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn strategy_names_parse() {
        let yaml = "scheduler:\n  strategy: weighted_latency\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.scheduler.strategy,
            SchedulingStrategy::WeightedLatency
        );
    }
}
