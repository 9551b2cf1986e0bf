// Read models returned by status and metrics queries

use crate::domain::{Job, JobResult, OperationKind};
use serde::Serialize;

/// Where a job currently lives, with its representation there
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum JobStatusView {
    Running { job: Job },
    Waiting { job: Job, position: usize },
    Finished { result: JobResult },
}

impl JobStatusView {
    pub fn job_id(&self) -> &str {
        match self {
            JobStatusView::Running { job } | JobStatusView::Waiting { job, .. } => &job.id,
            JobStatusView::Finished { result } => &result.id,
        }
    }
}

/// Health/metrics snapshot of one queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueMetrics {
    pub operation: OperationKind,
    pub queue_depth: usize,
    pub active_count: usize,
    pub max_concurrent: usize,
    pub utilization_percent: f64,
    pub completed_count: u64,
    pub failed_count: u64,
    pub timeout_count: u64,
    pub cancelled_count: u64,
}
