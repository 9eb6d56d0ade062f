use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ModelError;
use crate::ids::{ProjectId, ScanId};

/// Lifecycle states for a scan.
///
/// Transitions are monotonic along
/// `pending -> queued -> running -> {completed | stopped | error}`; once a
/// scan reaches a terminal state it never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScanStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Stopped,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Queued => "queued",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Stopped => "stopped",
            ScanStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Stopped | ScanStatus::Error
        )
    }

    /// Whether a scan in this state is owned by the dispatcher or a worker.
    pub fn is_active(&self) -> bool {
        matches!(self, ScanStatus::Queued | ScanStatus::Running)
    }
}

impl FromStr for ScanStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "queued" => Ok(ScanStatus::Queued),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            "stopped" => Ok(ScanStatus::Stopped),
            "error" => Ok(ScanStatus::Error),
            other => Err(ModelError::UnknownLabel {
                kind: "scan status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One orchestrated run of an ordered tool list against a target.
///
/// The tool list is immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scan {
    pub id: ScanId,
    pub target: String,
    pub tools: Vec<String>,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub project_id: Option<ProjectId>,
}

impl Scan {
    /// New scan in `pending`, before hand-off to the dispatcher.
    pub fn new(
        target: impl Into<String>,
        tools: Vec<String>,
        project_id: Option<ProjectId>,
    ) -> Self {
        Self {
            id: ScanId::new(),
            target: target.into(),
            tools,
            status: ScanStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
            project_id,
        }
    }
}
