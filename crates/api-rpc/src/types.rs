//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use atelier_core::application::{JobStatusView, QueueMetrics};
use atelier_core::domain::{CallerTier, OperationKind};
use serde::{Deserialize, Serialize};

/// jobs.submit.v1 - Submit a job to one service queue
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub service: OperationKind,
    pub caller_tier: CallerTier,
    pub payload_size_units: u64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Admission outcome; rejections are a normal response, not an RPC error
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub service: OperationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Stable code such as `QUEUE_FULL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// jobs.cancel.v1 - Cancel a job
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub service: OperationKind,
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

/// jobs.status.v1 - Look up a job
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub service: OperationKind,
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub job_id: String,
    #[serde(flatten)]
    pub status: JobStatusView,
}

/// admin.metrics.v1 - Queue metrics; all services when `service` is omitted
#[derive(Debug, Default, Deserialize)]
pub struct MetricsRequest {
    #[serde(default)]
    pub service: Option<OperationKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub queues: Vec<QueueMetrics>,
    pub uptime_seconds: u64,
}
