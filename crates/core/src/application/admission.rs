//! Admission control
//!
//! Gate in front of the waiting sequence. A rejected submission never
//! mutates queue state.

use crate::domain::{CallerTier, QueueConfig};
use crate::port::MemorySnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Work submitted by a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub caller_tier: CallerTier,
    pub payload_size_units: u64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SubmitRequest {
    pub fn new(caller_tier: CallerTier, payload_size_units: u64) -> Self {
        Self {
            caller_tier,
            payload_size_units,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Admission-time rejection. Never retried by the queue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdmissionError {
    #[error("queue full: {depth} waiting (limit {limit})")]
    QueueFull { depth: usize, limit: usize },

    #[error("payload of {size} units exceeds the {tier} tier limit of {limit}")]
    PayloadTooLarge {
        tier: CallerTier,
        size: u64,
        limit: u64,
    },

    #[error("memory pressure: {reason}")]
    MemoryPressure { reason: String },

    #[error("queue is shutting down")]
    QueueClosed,
}

impl AdmissionError {
    /// Stable machine-readable reason
    pub fn reason_code(&self) -> &'static str {
        match self {
            AdmissionError::QueueFull { .. } => "QUEUE_FULL",
            AdmissionError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AdmissionError::MemoryPressure { .. } => "MEMORY_PRESSURE",
            AdmissionError::QueueClosed => "QUEUE_CLOSED",
        }
    }
}

/// Queue occupancy seen by the admission gate
#[derive(Debug, Clone, Copy)]
pub struct Occupancy {
    pub waiting: usize,
    /// Payload units held by waiting + active jobs
    pub in_flight_units: u64,
}

/// Run every admission check in order; the first failure wins
pub fn admit(
    config: &QueueConfig,
    occupancy: Occupancy,
    request: &SubmitRequest,
    host_memory: MemorySnapshot,
) -> Result<(), AdmissionError> {
    if occupancy.waiting >= config.queue_depth_limit {
        return Err(AdmissionError::QueueFull {
            depth: occupancy.waiting,
            limit: config.queue_depth_limit,
        });
    }

    let tier_limit = config.tiers.get(request.caller_tier).max_payload_units;
    if request.payload_size_units > tier_limit {
        return Err(AdmissionError::PayloadTooLarge {
            tier: request.caller_tier,
            size: request.payload_size_units,
            limit: tier_limit,
        });
    }

    let projected = occupancy
        .in_flight_units
        .saturating_add(request.payload_size_units);
    if projected > config.memory_budget_units {
        return Err(AdmissionError::MemoryPressure {
            reason: format!(
                "{} payload units in flight would exceed budget of {}",
                projected, config.memory_budget_units
            ),
        });
    }

    let usage = host_memory.usage_percent();
    if usage > config.max_host_memory_percent {
        return Err(AdmissionError::MemoryPressure {
            reason: format!(
                "host memory at {:.1}% (limit {:.1}%)",
                usage, config.max_host_memory_percent
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationKind;

    fn idle_host() -> MemorySnapshot {
        MemorySnapshot {
            used_mb: 100,
            total_mb: 1000,
        }
    }

    fn config() -> QueueConfig {
        let mut config = QueueConfig::for_operation(OperationKind::Render);
        config.queue_depth_limit = 5;
        config.memory_budget_units = 1_000;
        config
    }

    fn occupancy(waiting: usize, in_flight_units: u64) -> Occupancy {
        Occupancy {
            waiting,
            in_flight_units,
        }
    }

    #[test]
    fn test_rejects_exactly_at_depth_limit() {
        let req = SubmitRequest::new(CallerTier::Basic, 1);
        assert!(admit(&config(), occupancy(4, 0), &req, idle_host()).is_ok());

        let err = admit(&config(), occupancy(5, 0), &req, idle_host()).unwrap_err();
        assert_eq!(err, AdmissionError::QueueFull { depth: 5, limit: 5 });
        assert_eq!(err.reason_code(), "QUEUE_FULL");
    }

    #[test]
    fn test_rejects_payload_above_tier_limit() {
        let mut config = config();
        config.tiers.basic.max_payload_units = 100;

        let req = SubmitRequest::new(CallerTier::Basic, 101);
        let err = admit(&config, occupancy(0, 0), &req, idle_host()).unwrap_err();
        assert!(matches!(err, AdmissionError::PayloadTooLarge { limit: 100, .. }));

        let premium = SubmitRequest::new(CallerTier::Premium, 101);
        assert!(admit(&config, occupancy(0, 0), &premium, idle_host()).is_ok());
    }

    #[test]
    fn test_rejects_when_budget_would_overflow() {
        let req = SubmitRequest::new(CallerTier::Standard, 300);
        assert!(admit(&config(), occupancy(1, 700), &req, idle_host()).is_ok());

        let err = admit(&config(), occupancy(1, 701), &req, idle_host()).unwrap_err();
        assert_eq!(err.reason_code(), "MEMORY_PRESSURE");
    }

    #[test]
    fn test_rejects_on_host_memory() {
        let busy = MemorySnapshot {
            used_mb: 990,
            total_mb: 1000,
        };
        let req = SubmitRequest::new(CallerTier::Basic, 1);
        let err = admit(&config(), occupancy(0, 0), &req, busy).unwrap_err();
        assert!(err.to_string().contains("host memory"));
    }
}
