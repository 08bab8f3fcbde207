//! Model and region catalog entries

use serde::{Deserialize, Serialize};

/// Model catalog status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Servable
    Active,
    /// No longer servable; kept for usage history
    Retired,
}

/// Catalog entry for a servable model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Canonical name, e.g. `llama-3-8b`
    pub name: String,
    /// Model family, e.g. `llama-3`
    pub family: String,
    /// Size class, e.g. `8b`
    pub size_class: String,
    /// Minimum accelerator memory in GB
    pub min_gpu_memory_gb: u32,
    /// Catalog status
    pub status: ModelStatus,
}

/// Cloud region with provider tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    /// Region identifier, e.g. `us-east-1`
    pub name: String,
    /// Provider tag, e.g. `aws`
    pub provider: String,
}
