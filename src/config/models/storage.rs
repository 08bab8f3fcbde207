//! Storage configuration

use serde::{Deserialize, Serialize};

/// Storage configuration covering database and counter store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Redis configuration (rate-limit counters)
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Whether Redis-backed counters are enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            enabled: true,
            connection_timeout: default_connection_timeout(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://fleetgate.db?mode=rwc".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
