//! RPC Method Handlers
//!
//! Thin translation between wire types and the queue handles.

use crate::error::to_rpc_error;
use crate::types::{
    CancelRequest, CancelResponse, MetricsRequest, MetricsResponse, StatusRequest,
    StatusResponse, SubmitRequest, SubmitResponse,
};
use atelier_core::application::{self, JobServices};
use atelier_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    services: JobServices,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(services: JobServices) -> Self {
        Self {
            services,
            start_time: std::time::Instant::now(),
        }
    }

    /// jobs.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        let queue = self.services.queue(params.service);
        let request = application::SubmitRequest::new(params.caller_tier, params.payload_size_units)
            .with_payload(params.payload);

        let response = match queue.submit(request).await {
            Ok(job_id) => SubmitResponse {
                accepted: true,
                service: params.service,
                job_id: Some(job_id),
                rejection_reason: None,
                message: None,
            },
            Err(e) => {
                debug!(service = %params.service, reason = e.reason_code(), "Submit rejected");
                SubmitResponse {
                    accepted: false,
                    service: params.service,
                    job_id: None,
                    rejection_reason: Some(e.reason_code().to_string()),
                    message: Some(e.to_string()),
                }
            }
        };
        Ok(response)
    }

    /// jobs.cancel.v1
    pub async fn cancel(&self, params: CancelRequest) -> Result<CancelResponse, ErrorObjectOwned> {
        let cancelled = self
            .services
            .queue(params.service)
            .cancel(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(CancelResponse {
            job_id: params.job_id,
            cancelled,
        })
    }

    /// jobs.status.v1
    pub async fn status(&self, params: StatusRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        let status = self
            .services
            .queue(params.service)
            .get_status(&params.job_id)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| {
                to_rpc_error(AppError::NotFound(format!(
                    "Job {} not found in {} queue",
                    params.job_id, params.service
                )))
            })?;

        Ok(StatusResponse {
            job_id: params.job_id,
            status,
        })
    }

    /// admin.metrics.v1
    pub async fn metrics(&self, params: MetricsRequest) -> Result<MetricsResponse, ErrorObjectOwned> {
        let queues = match params.service {
            Some(service) => vec![self
                .services
                .queue(service)
                .get_metrics()
                .await
                .map_err(to_rpc_error)?],
            None => self.services.metrics().await.map_err(to_rpc_error)?,
        };

        Ok(MetricsResponse {
            queues,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use atelier_core::application::{JobQueue, JobStatusView};
    use atelier_core::domain::{CallerTier, OperationKind, QueueConfig};
    use atelier_core::port::job_executor::mocks::MockJobExecutor;
    use std::sync::Arc;

    fn handler() -> RpcHandler {
        let executor = Arc::new(MockJobExecutor::new_hanging());
        let spawn = |kind: OperationKind| {
            let mut config = QueueConfig::for_operation(kind);
            config.max_concurrent_jobs = 1;
            config.queue_depth_limit = 1;
            JobQueue::builder(config, executor.clone()).spawn().unwrap()
        };
        let services = JobServices::new(
            spawn(OperationKind::Render),
            spawn(OperationKind::Export),
            spawn(OperationKind::Sync),
        )
        .unwrap();
        RpcHandler::new(services)
    }

    fn submit(service: OperationKind) -> SubmitRequest {
        SubmitRequest {
            service,
            caller_tier: CallerTier::Standard,
            payload_size_units: 4,
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_submit_accepts_then_reports_queue_full() {
        let handler = handler();

        let first = handler.submit(submit(OperationKind::Render)).await.unwrap();
        assert!(first.accepted);
        let second = handler.submit(submit(OperationKind::Render)).await.unwrap();
        assert!(second.accepted);

        let third = handler.submit(submit(OperationKind::Render)).await.unwrap();
        assert!(!third.accepted);
        assert!(third.job_id.is_none());
        assert_eq!(third.rejection_reason.as_deref(), Some("QUEUE_FULL"));

        // Other services are independent
        assert!(handler.submit(submit(OperationKind::Sync)).await.unwrap().accepted);
    }

    #[tokio::test]
    async fn test_status_and_cancel() {
        let handler = handler();
        let job_id = handler
            .submit(submit(OperationKind::Export))
            .await
            .unwrap()
            .job_id
            .unwrap();

        let status = handler
            .status(StatusRequest {
                service: OperationKind::Export,
                job_id: job_id.clone(),
            })
            .await
            .unwrap();
        assert!(matches!(status.status, JobStatusView::Running { .. }));

        let cancel = handler
            .cancel(CancelRequest {
                service: OperationKind::Export,
                job_id: job_id.clone(),
            })
            .await
            .unwrap();
        assert!(cancel.cancelled);

        // Wrong service does not know the job
        let err = handler
            .status(StatusRequest {
                service: OperationKind::Render,
                job_id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_for_one_or_all_services() {
        let handler = handler();
        handler.submit(submit(OperationKind::Sync)).await.unwrap();

        let all = handler.metrics(MetricsRequest::default()).await.unwrap();
        assert_eq!(all.queues.len(), 3);

        let sync = handler
            .metrics(MetricsRequest {
                service: Some(OperationKind::Sync),
            })
            .await
            .unwrap();
        assert_eq!(sync.queues.len(), 1);
        assert_eq!(sync.queues[0].active_count, 1);
    }
}
