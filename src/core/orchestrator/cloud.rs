//! Cloud launch tool invocation
//!
//! The orchestrator shells out to an external launch utility. This wrapper
//! owns the argument conventions and the non-launch subcommands (status,
//! down) used by the health monitor and retirement handler.

use crate::utils::error::{FleetError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Observed cloud-side state of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudClusterState {
    /// The cloud still believes the cluster is up
    Present,
    /// The cluster is gone or stopped
    Absent,
}

/// Handle to the external cloud launch utility
#[derive(Debug, Clone)]
pub struct CloudTool {
    tool: String,
}

impl CloudTool {
    /// Wrap a launch tool binary
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Build the launch invocation for a rendered spec
    ///
    /// stdout/stderr are piped so the orchestrator's scanner can stream
    /// stage transitions while the tool runs.
    pub fn launch_command(&self, cluster_name: &str, spec_path: &str) -> Command {
        let mut cmd = Command::new(&self.tool);
        cmd.arg("launch")
            .arg("--cluster")
            .arg(cluster_name)
            .arg("--yes")
            .arg(spec_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Query the cloud inventory for a cluster
    pub async fn cluster_state(&self, cluster_name: &str) -> Result<CloudClusterState> {
        let output = tokio::time::timeout(
            Duration::from_secs(30),
            Command::new(&self.tool)
                .arg("status")
                .arg(cluster_name)
                .stdin(Stdio::null())
                .output(),
        )
        .await
        .map_err(|_| FleetError::internal("cloud status query timed out"))?
        .map_err(FleetError::Io)?;

        if !output.status.success() {
            return Ok(CloudClusterState::Absent);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let present = stdout
            .lines()
            .any(|line| line.contains(cluster_name) && line.contains("UP"));
        Ok(if present {
            CloudClusterState::Present
        } else {
            CloudClusterState::Absent
        })
    }

    /// Tear a cluster down, best effort
    pub async fn down(&self, cluster_name: &str) {
        debug!(cluster = cluster_name, "requesting cloud teardown");
        let result = tokio::time::timeout(
            Duration::from_secs(120),
            Command::new(&self.tool)
                .arg("down")
                .arg("--yes")
                .arg(cluster_name)
                .stdin(Stdio::null())
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) if output.status.success() => {
                debug!(cluster = cluster_name, "cloud teardown completed");
            }
            Ok(Ok(output)) => {
                warn!(
                    cluster = cluster_name,
                    code = ?output.status.code(),
                    "cloud teardown exited non-zero"
                );
            }
            Ok(Err(e)) => warn!(cluster = cluster_name, "cloud teardown failed: {}", e),
            Err(_) => warn!(cluster = cluster_name, "cloud teardown timed out"),
        }
    }

    /// Whether credentials for a provider are discoverable in this process
    ///
    /// The credential vault itself is an external collaborator; this is the
    /// pre-flight presence check only.
    pub fn credentials_present(provider: &str) -> bool {
        match provider {
            "aws" => {
                std::env::var("AWS_ACCESS_KEY_ID").is_ok()
                    || std::env::var("AWS_PROFILE").is_ok()
                    || dirs_credentials_file(".aws/credentials")
            }
            "gcp" => {
                std::env::var("GOOGLE_APPLICATION_CREDENTIALS").is_ok()
                    || dirs_credentials_file(".config/gcloud/application_default_credentials.json")
            }
            "azure" => {
                std::env::var("AZURE_CLIENT_ID").is_ok() || dirs_credentials_file(".azure")
            }
            _ => false,
        }
    }
}

fn dirs_credentials_file(relative: &str) -> bool {
    std::env::var("HOME")
        .map(|home| std::path::Path::new(&home).join(relative).exists())
        .unwrap_or(false)
}
