// ABOUTME: Data structures for inference job requests, handles and status snapshots
// ABOUTME: These are serialized to JSON for API communication

use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};

pub const DEFAULT_SAMPLE_LIMIT: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub evse_id: String,
    pub connector_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl InferenceRequest {
    pub fn new(evse_id: impl Into<String>, connector_id: u32) -> Self {
        Self {
            evse_id: evse_id.into(),
            connector_id,
            limit: Some(DEFAULT_SAMPLE_LIMIT),
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.evse_id.trim().is_empty() {
            return Err(InferenceError::InvalidRequest(
                "evse_id is required".to_string(),
            ));
        }
        if self.connector_id < 1 {
            return Err(InferenceError::InvalidRequest(
                "connector_id must be >= 1".to_string(),
            ));
        }
        if self.limit == Some(0) {
            return Err(InferenceError::InvalidRequest(
                "limit must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trigger response. Only `job_id` matters to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    #[serde(default)]
    pub progress: u8, // 0-100, not guaranteed monotonic
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobState::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub device_id: String,
    pub evse_id: String,
    pub connector_id: u32,
    pub s3_bucket: String,
    pub s3_path: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}
