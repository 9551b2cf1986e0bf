// Health Reporter
// Periodically logs each queue's depth, occupancy and outcome counters

use crate::application::constants::DEGRADED_UTILIZATION_PERCENT;
use crate::application::queue::QueueMetrics;
use crate::application::services::JobServices;
use crate::application::shutdown::ShutdownToken;
use serde::Serialize;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Coarse health of one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthLevel {
    Healthy,
    /// Near its concurrency limit or with a full waiting sequence
    Degraded,
}

pub fn assess(metrics: &QueueMetrics, depth_limit: usize) -> HealthLevel {
    if metrics.utilization_percent >= DEGRADED_UTILIZATION_PERCENT
        || metrics.queue_depth >= depth_limit
    {
        HealthLevel::Degraded
    } else {
        HealthLevel::Healthy
    }
}

/// Background task; spawn with `tokio::spawn(reporter.run(token))`
pub struct HealthReporter {
    services: JobServices,
    period: Duration,
}

impl HealthReporter {
    pub fn new(services: JobServices, period: Duration) -> Self {
        Self { services, period }
    }

    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(interval_secs = self.period.as_secs(), "Health reporter started");

        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tick.tick() => {
                    self.report().await;
                }
            }
        }

        info!("Health reporter stopped");
    }

    /// Log one line per queue; returns the assessed levels
    pub async fn report(&self) -> Vec<HealthLevel> {
        let metrics = match self.services.metrics().await {
            Ok(metrics) => metrics,
            Err(e) => {
                error!(error = %e, "Health check could not read queue metrics");
                return Vec::new();
            }
        };

        metrics
            .iter()
            .map(|m| {
                let depth_limit = self.services.queue(m.operation).config().queue_depth_limit;
                let level = assess(m, depth_limit);
                match level {
                    HealthLevel::Healthy => info!(
                        operation = %m.operation,
                        queue_depth = m.queue_depth,
                        active = m.active_count,
                        utilization = m.utilization_percent,
                        completed = m.completed_count,
                        failed = m.failed_count,
                        timeouts = m.timeout_count,
                        "Queue healthy"
                    ),
                    HealthLevel::Degraded => warn!(
                        operation = %m.operation,
                        queue_depth = m.queue_depth,
                        depth_limit = depth_limit,
                        active = m.active_count,
                        utilization = m.utilization_percent,
                        "Queue degraded"
                    ),
                }
                level
            })
            .collect()
    }
}
