//! Worker orchestrator configuration

use serde::{Deserialize, Serialize};

/// Launch orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Path to the cloud launch utility
    #[serde(default = "default_launch_tool")]
    pub launch_tool: String,
    /// Base URL workers use to reach this control plane
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
    /// Overall launch deadline in seconds
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout: u64,
    /// Post-launch health verification window in seconds
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout: u64,
    /// Interval between post-launch health polls in seconds
    #[serde(default = "default_health_poll_interval")]
    pub health_poll_interval: u64,
    /// Directory where rendered launch specs are written
    #[serde(default = "default_spec_dir")]
    pub spec_dir: String,
    /// Hours a terminal launch job is retained before garbage collection
    #[serde(default = "default_job_retention_hours")]
    pub job_retention_hours: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            launch_tool: default_launch_tool(),
            control_plane_url: default_control_plane_url(),
            launch_timeout: default_launch_timeout(),
            health_check_timeout: default_health_check_timeout(),
            health_poll_interval: default_health_poll_interval(),
            spec_dir: default_spec_dir(),
            job_retention_hours: default_job_retention_hours(),
        }
    }
}

impl OrchestratorConfig {
    /// Validate orchestrator configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.launch_tool.is_empty() {
            return Err("orchestrator.launch_tool cannot be empty".to_string());
        }
        if self.launch_timeout == 0 {
            return Err("orchestrator.launch_timeout cannot be 0".to_string());
        }
        if self.health_poll_interval == 0 || self.health_poll_interval > 5 {
            return Err(
                "orchestrator.health_poll_interval must be within [1, 5] seconds".to_string(),
            );
        }
        url::Url::parse(&self.control_plane_url)
            .map_err(|e| format!("orchestrator.control_plane_url is invalid: {}", e))?;
        Ok(())
    }
}

fn default_launch_tool() -> String {
    "sky".to_string()
}

fn default_control_plane_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_launch_timeout() -> u64 {
    20 * 60
}

fn default_health_check_timeout() -> u64 {
    3 * 60
}

fn default_health_poll_interval() -> u64 {
    5
}

fn default_spec_dir() -> String {
    std::env::temp_dir()
        .join("fleetgate-specs")
        .to_string_lossy()
        .into_owned()
}

fn default_job_retention_hours() -> u64 {
    24
}
