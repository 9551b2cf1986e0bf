// Terminal Result Domain Model

use crate::domain::job::{Job, JobId, JobState, OperationKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-visible terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl ResultStatus {
    /// Job state a result with this status leaves behind
    pub fn job_state(self) -> JobState {
        match self {
            ResultStatus::Completed => JobState::Completed,
            ResultStatus::Cancelled => JobState::Cancelled,
            ResultStatus::Failed | ResultStatus::Timeout => JobState::Failed,
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Completed => write!(f, "COMPLETED"),
            ResultStatus::Failed => write!(f, "FAILED"),
            ResultStatus::Cancelled => write!(f, "CANCELLED"),
            ResultStatus::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Structured error payload attached to non-successful results
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    #[error("{} after {after_ms}ms", .operation.timeout_label())]
    Timeout {
        operation: OperationKind,
        after_ms: u64,
    },

    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<JobError> },
}

impl JobError {
    pub fn is_timeout(&self) -> bool {
        match self {
            JobError::Timeout { .. } => true,
            JobError::RetriesExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }
}

/// Final outcome of a job. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub id: JobId,
    pub operation: OperationKind,
    pub status: ResultStatus,
    pub output: Option<String>,
    pub error: Option<JobError>,
    pub attempts: u32,

    pub submitted_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: i64,
    /// Submission to start of the last attempt
    pub queue_wait_ms: i64,
    /// Duration of the last attempt
    pub run_ms: i64,
}

impl JobResult {
    /// Build the terminal result for a job that has just left the active set
    pub fn from_job(
        job: &Job,
        status: ResultStatus,
        output: Option<String>,
        error: Option<JobError>,
        completed_at: i64,
    ) -> Self {
        let started = job.started_at.unwrap_or(completed_at);
        Self {
            id: job.id.clone(),
            operation: job.operation,
            status,
            output,
            error,
            attempts: job.attempts,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            completed_at,
            queue_wait_ms: (started - job.submitted_at).max(0),
            run_ms: (completed_at - started).max(0),
        }
    }
}
