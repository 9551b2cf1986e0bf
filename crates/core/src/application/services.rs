// Job Services - registry of the per-operation queues
//
// Built once by the composition root; handed to adapters (RPC, health).

use crate::application::constants::SHUTDOWN_TIMEOUT;
use crate::application::queue::{JobQueue, QueueMetrics};
use crate::domain::OperationKind;
use crate::error::{AppError, Result};
use tracing::{info, warn};

/// The render, export and sync queues
#[derive(Clone)]
pub struct JobServices {
    render: JobQueue,
    export: JobQueue,
    sync: JobQueue,
}

impl JobServices {
    /// # Errors
    /// AppError::Validation if a queue is registered under the wrong operation
    pub fn new(render: JobQueue, export: JobQueue, sync: JobQueue) -> Result<Self> {
        for (expected, queue) in [
            (OperationKind::Render, &render),
            (OperationKind::Export, &export),
            (OperationKind::Sync, &sync),
        ] {
            if queue.operation() != expected {
                return Err(AppError::Validation(format!(
                    "{} queue registered as {}",
                    queue.operation(),
                    expected
                )));
            }
        }
        Ok(Self {
            render,
            export,
            sync,
        })
    }

    pub fn queue(&self, kind: OperationKind) -> &JobQueue {
        match kind {
            OperationKind::Render => &self.render,
            OperationKind::Export => &self.export,
            OperationKind::Sync => &self.sync,
        }
    }

    /// Metrics for every queue, in `OperationKind::ALL` order
    pub async fn metrics(&self) -> Result<Vec<QueueMetrics>> {
        let mut all = Vec::with_capacity(OperationKind::ALL.len());
        for kind in OperationKind::ALL {
            all.push(self.queue(kind).get_metrics().await?);
        }
        Ok(all)
    }

    /// Shut down every queue; a queue that already stopped is not an error
    pub async fn shutdown_all(&self) {
        for kind in OperationKind::ALL {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.queue(kind).shutdown()).await {
                Ok(Ok(())) => info!(operation = %kind, "Queue shut down"),
                Ok(Err(e)) => warn!(operation = %kind, error = %e, "Queue was already closed"),
                Err(_) => warn!(operation = %kind, "Queue shutdown timed out"),
            }
        }
    }
}
