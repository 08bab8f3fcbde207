//! Storage layer for the control plane
//!
//! This module provides data persistence and the distributed counter store.

/// Database storage module
pub mod database;
/// Redis counter store module
pub mod redis;

use crate::config::StorageConfig;
use crate::utils::error::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Main storage layer that orchestrates all storage backends
#[derive(Debug, Clone)]
pub struct StorageLayer {
    /// Database connection pool
    pub database: Arc<database::Database>,
    /// Redis counter store
    pub redis: Arc<redis::RedisPool>,
}

impl StorageLayer {
    /// Create a new storage layer
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        info!("Initializing storage layer");

        debug!("Connecting to database");
        let database = Arc::new(database::Database::new(&config.database).await?);

        debug!("Connecting to Redis");
        let redis = Arc::new(redis::RedisPool::connect_or_noop(&config.redis).await);

        info!("Storage layer initialized successfully");
        Ok(Self { database, redis })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.database.migrate().await
    }

    /// Health check for all storage backends
    pub async fn health_check(&self) -> StorageHealthStatus {
        let mut status = StorageHealthStatus {
            database: false,
            redis: false,
            overall: false,
        };

        match self.database.health_check().await {
            Ok(_) => status.database = true,
            Err(e) => warn!("Database health check failed: {}", e),
        }

        match self.redis.health_check().await {
            Ok(_) => status.redis = true,
            Err(e) => warn!("Redis health check failed: {}", e),
        }

        status.overall = status.database && status.redis;
        status
    }

    /// Get database handle
    pub fn db(&self) -> &database::Database {
        &self.database
    }

    /// Get Redis pool
    pub fn redis(&self) -> &redis::RedisPool {
        &self.redis
    }
}

/// Storage health status
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageHealthStatus {
    /// Database health status
    pub database: bool,
    /// Redis health status
    pub redis: bool,
    /// Overall health status
    pub overall: bool,
}
