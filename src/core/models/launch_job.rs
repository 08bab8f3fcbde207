//! Launch job progress tracking

use crate::utils::error::LaunchFailureCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stage pipeline of an in-flight worker launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchJobStatus {
    /// Pre-flight checks
    Validating,
    /// Cloud entity being provisioned
    Provisioning,
    /// Runtime setup on the instance
    Installing,
    /// Model weights loading
    Loading,
    /// Inference server starting
    Starting,
    /// Post-launch health verification
    Verifying,
    /// Worker registered and healthy
    Completed,
    /// Launch failed; error carries the classification
    Failed,
    /// Cancelled by the operator
    Cancelled,
    /// Overall deadline exceeded
    Timeout,
}

impl LaunchJobStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }

    /// Coarse progress percentage for this stage
    pub fn percent(&self) -> u8 {
        match self {
            Self::Validating => 5,
            Self::Provisioning => 25,
            Self::Installing => 45,
            Self::Loading => 65,
            Self::Starting => 80,
            Self::Verifying => 90,
            Self::Completed => 100,
            Self::Failed | Self::Cancelled | Self::Timeout => 100,
        }
    }

    /// Stage ordering; transitions never move backwards
    pub fn rank(&self) -> u8 {
        match self {
            Self::Validating => 0,
            Self::Provisioning => 1,
            Self::Installing => 2,
            Self::Loading => 3,
            Self::Starting => 4,
            Self::Verifying => 5,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout => 6,
        }
    }
}

impl std::fmt::Display for LaunchJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::Provisioning => "provisioning",
            Self::Installing => "installing",
            Self::Loading => "loading",
            Self::Starting => "starting",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// One appended progress line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageLine {
    /// When the line was recorded
    pub at: DateTime<Utc>,
    /// Stage active when the line was recorded
    pub stage: LaunchJobStatus,
    /// Human-readable progress line
    pub message: String,
}

/// Classified launch error with remediation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchJobError {
    /// Failure classification
    pub category: LaunchFailureCategory,
    /// Details from the launch tool
    pub message: String,
    /// Operator-facing remediation hint
    pub remediation: String,
}

/// Durable progress handle for one launch attempt
///
/// Persisted so a server restart does not lose state visible to the user;
/// garbage-collected 24 h after reaching a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchJob {
    /// Job ID
    pub id: Uuid,
    /// Node this launch is bringing up
    pub node_id: Uuid,
    /// Current stage
    pub status: LaunchJobStatus,
    /// Progress percentage in [0, 100]
    pub percent: u8,
    /// Append-only stage messages
    pub stages: Vec<StageLine>,
    /// Present when the job failed
    pub error: Option<LaunchJobError>,
    /// Overall launch deadline
    pub deadline: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl LaunchJob {
    /// Create a job in state `validating` for a node launch
    pub fn new(node_id: Uuid, deadline: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            node_id,
            status: LaunchJobStatus::Validating,
            percent: LaunchJobStatus::Validating.percent(),
            stages: Vec::new(),
            error: None,
            deadline,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a stage line and advance the stage if it moved forward
    ///
    /// Transitions are monotonic: a line for an earlier stage still gets
    /// appended, but the status never moves backwards or out of terminal.
    pub fn advance(&mut self, stage: LaunchJobStatus, message: impl Into<String>) {
        let now = Utc::now();
        if !self.status.is_terminal() && stage.rank() >= self.status.rank() {
            self.status = stage;
            self.percent = stage.percent();
        }
        self.stages.push(StageLine {
            at: now,
            stage: self.status,
            message: message.into(),
        });
        self.updated_at = now;
    }

    /// Move to `failed` with a classified error
    pub fn fail(&mut self, category: LaunchFailureCategory, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let message = message.into();
        self.error = Some(LaunchJobError {
            category,
            remediation: category.remediation().to_string(),
            message: message.clone(),
        });
        self.status = if category == LaunchFailureCategory::Timeout {
            LaunchJobStatus::Timeout
        } else {
            LaunchJobStatus::Failed
        };
        self.percent = 100;
        let now = Utc::now();
        self.stages.push(StageLine {
            at: now,
            stage: self.status,
            message,
        });
        self.updated_at = now;
    }
}
