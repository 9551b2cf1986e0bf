// Simulated executor
// Stands in for real rendering, encoding and transfer: sleeps for a duration
// proportional to the payload size and honours cancellation.
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use atelier_core::domain::{Job, OperationKind};
use atelier_core::port::{ExecutionError, JobExecutor, WorkOutput};

/// Export formats accepted in the `format` payload field
pub const EXPORT_FORMATS: [&str; 6] = ["png", "jpg", "webp", "pdf", "svg", "psd"];

const DEFAULT_EXPORT_FORMAT: &str = "png";

/// Simulated cost of one payload unit, per operation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationProfile {
    pub render_ms_per_unit: u64,
    pub export_ms_per_unit: u64,
    pub sync_ms_per_unit: u64,
    /// Probability in [0, 1] that an attempt fails after its work is done
    pub failure_rate: f64,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            render_ms_per_unit: 20,
            export_ms_per_unit: 15,
            sync_ms_per_unit: 10,
            failure_rate: 0.0,
        }
    }
}

impl SimulationProfile {
    pub fn work_duration(&self, operation: OperationKind, payload_size_units: u64) -> Duration {
        let per_unit = match operation {
            OperationKind::Render => self.render_ms_per_unit,
            OperationKind::Export => self.export_ms_per_unit,
            OperationKind::Sync => self.sync_ms_per_unit,
        };
        Duration::from_millis(per_unit.saturating_mul(payload_size_units))
    }
}

/// Timer-backed `JobExecutor`
pub struct SimulatedExecutor {
    profile: SimulationProfile,
}

impl SimulatedExecutor {
    pub fn new(profile: SimulationProfile) -> Self {
        Self { profile }
    }

    /// Output location the finished job would have produced
    fn descriptor(job: &Job) -> Result<String, ExecutionError> {
        match job.operation {
            OperationKind::Render => Ok(format!("renders/{}.png", job.id)),
            OperationKind::Export => {
                let format = match job.payload.get("format") {
                    None => DEFAULT_EXPORT_FORMAT,
                    Some(value) => value.as_str().ok_or_else(|| {
                        ExecutionError::InvalidPayload("'format' must be a string".to_string())
                    })?,
                };
                let format = format.to_ascii_lowercase();
                if !EXPORT_FORMATS.contains(&format.as_str()) {
                    return Err(ExecutionError::InvalidPayload(format!(
                        "unsupported export format '{}'",
                        format
                    )));
                }
                Ok(format!("exports/{}.{}", job.id, format))
            }
            OperationKind::Sync => Ok(format!("sync/{}", job.id)),
        }
    }

    fn roll_failure(&self) -> bool {
        self.profile.failure_rate > 0.0
            && rand::thread_rng().gen_bool(self.profile.failure_rate.clamp(0.0, 1.0))
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(SimulationProfile::default())
    }
}

#[async_trait]
impl JobExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        job: &Job,
        cancel: CancellationToken,
    ) -> Result<WorkOutput, ExecutionError> {
        let descriptor = Self::descriptor(job)?;
        let work = self.profile.work_duration(job.operation, job.payload_size_units);
        let fails = self.roll_failure();

        debug!(
            job_id = %job.id,
            operation = %job.operation,
            attempt = job.attempts,
            work_ms = work.as_millis() as u64,
            "Simulated work started"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(job_id = %job.id, "Simulated work aborted");
                return Err(ExecutionError::Aborted);
            }
            _ = tokio::time::sleep(work) => {}
        }

        if fails {
            return Err(ExecutionError::Failed(format!(
                "simulated {} failure",
                job.operation
            )));
        }

        info!(job_id = %job.id, output = %descriptor, "Simulated work finished");
        Ok(WorkOutput::new(descriptor))
    }
}
