use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend-assigned job identifier.
///
/// Opaque to this crate and kept exactly as given, but never empty: every
/// constructor rejects blank strings, so holding a `JobId` is proof that
/// resolution may proceed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

/// Returned when a job identifier is empty or whitespace only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyJobId;

impl fmt::Display for EmptyJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("job_id is required")
    }
}

impl std::error::Error for EmptyJobId {}

impl JobId {
    pub fn parse(raw: &str) -> Result<Self, EmptyJobId> {
        if raw.trim().is_empty() {
            Err(EmptyJobId)
        } else {
            Ok(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = EmptyJobId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status as reported by the backend.
///
/// The vocabulary belongs to the backend (`queued`/`running`/`succeeded`/`failed`, or
/// Celery's `PENDING`/`STARTED`/`SUCCESS`/`FAILURE`), so it is kept as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStatus(String);

impl JobStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this status is one the backend never leaves.
    ///
    /// Nothing in the poller acts on this; it exists for callers that decide
    /// to stop polling once a job has settled.
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.0.to_ascii_lowercase().as_str(),
            "succeeded" | "success" | "completed" | "done"
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.0.to_ascii_lowercase().as_str(),
            "failed" | "failure" | "error" | "revoked" | "cancelled"
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A generation job as returned by the create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "job_id", alias = "task_id")]
    pub id: JobId,
    /// Some backends only hand back the identifier on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

/// Input for creating a new generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobInput {
    pub prompt: String,
}

/// Body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(alias = "state")]
    pub status: JobStatus,
}
