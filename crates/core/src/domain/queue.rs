// Queue Configuration Domain Model

use crate::domain::job::{CallerTier, OperationKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operational minimums enforced at startup
pub mod minimums {
    pub const MAX_CONCURRENT_JOBS: usize = 1;
    pub const QUEUE_DEPTH_LIMIT: usize = 1;
    pub const BASE_TIMEOUT_MS: u64 = 1_000;
    pub const MAX_RETRIES: u32 = 1;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid configuration for `{key}` ({operation} queue): {reason}")]
    Invalid {
        operation: OperationKind,
        key: &'static str,
        reason: String,
    },
}

/// Per-tier limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Timeout floor for jobs of this tier
    pub base_timeout_ms: u64,
    /// Largest payload accepted from this tier
    pub max_payload_units: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    pub basic: TierLimits,
    pub standard: TierLimits,
    pub premium: TierLimits,
}

impl TierTable {
    pub fn get(&self, tier: CallerTier) -> &TierLimits {
        match tier {
            CallerTier::Basic => &self.basic,
            CallerTier::Standard => &self.standard,
            CallerTier::Premium => &self.premium,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (CallerTier, &TierLimits)> {
        [
            (CallerTier::Basic, &self.basic),
            (CallerTier::Standard, &self.standard),
            (CallerTier::Premium, &self.premium),
        ]
        .into_iter()
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            basic: TierLimits {
                base_timeout_ms: 30_000,
                max_payload_units: 500,
            },
            standard: TierLimits {
                base_timeout_ms: 60_000,
                max_payload_units: 2_000,
            },
            premium: TierLimits {
                base_timeout_ms: 120_000,
                max_payload_units: 10_000,
            },
        }
    }
}

/// Delay strategy between a failed attempt and the next dispatch trigger
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Flat `retry_backoff_ms` after every failure
    #[default]
    Fixed,
    /// `retry_backoff_ms * factor^(attempt-1)`, capped, with per-job jitter
    Exponential { factor: f64, max_delay_ms: u64 },
}

/// Configuration of a single queue instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub operation: OperationKind,
    pub max_concurrent_jobs: usize,
    pub queue_depth_limit: usize,
    /// Operation base timeout used by the size-scaled deadline
    pub base_timeout_ms: u64,
    pub tiers: TierTable,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Dispatch is deferred while load pressure is above this ratio
    pub backpressure_threshold: f64,
    /// Upper bound on payload units held by waiting + active jobs
    pub memory_budget_units: u64,
    /// Host memory usage above which admission is refused
    pub max_host_memory_percent: f32,
}

impl QueueConfig {
    /// Default limits for a given service
    pub fn for_operation(operation: OperationKind) -> Self {
        let (max_concurrent_jobs, queue_depth_limit, base_timeout_ms) = match operation {
            OperationKind::Render => (4, 100, 30_000),
            OperationKind::Export => (2, 50, 60_000),
            OperationKind::Sync => (8, 100, 45_000),
        };
        Self {
            operation,
            max_concurrent_jobs,
            queue_depth_limit,
            base_timeout_ms,
            tiers: TierTable::default(),
            max_retries: 3,
            retry_backoff_ms: 2_000,
            backoff: BackoffStrategy::Fixed,
            backpressure_threshold: 0.7,
            memory_budget_units: 50_000,
            max_host_memory_percent: 95.0,
        }
    }

    /// Reject configurations below operational minimums
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, reason: String| ConfigError::Invalid {
            operation: self.operation,
            key,
            reason,
        };

        if self.max_concurrent_jobs < minimums::MAX_CONCURRENT_JOBS {
            return Err(invalid(
                "max_concurrent_jobs",
                format!("must be at least {}", minimums::MAX_CONCURRENT_JOBS),
            ));
        }
        if self.queue_depth_limit < minimums::QUEUE_DEPTH_LIMIT {
            return Err(invalid(
                "queue_depth_limit",
                format!("must be at least {}", minimums::QUEUE_DEPTH_LIMIT),
            ));
        }
        if self.base_timeout_ms < minimums::BASE_TIMEOUT_MS {
            return Err(invalid(
                "base_timeout_ms",
                format!("must be at least {}ms", minimums::BASE_TIMEOUT_MS),
            ));
        }
        for (tier, limits) in self.tiers.iter() {
            if limits.base_timeout_ms < minimums::BASE_TIMEOUT_MS {
                return Err(invalid(
                    "tiers.base_timeout_ms",
                    format!(
                        "{} tier must be at least {}ms",
                        tier,
                        minimums::BASE_TIMEOUT_MS
                    ),
                ));
            }
            if limits.max_payload_units == 0 {
                return Err(invalid(
                    "tiers.max_payload_units",
                    format!("{} tier must accept a non-empty payload", tier),
                ));
            }
        }
        if self.max_retries < minimums::MAX_RETRIES {
            return Err(invalid(
                "max_retries",
                format!("must be at least {}", minimums::MAX_RETRIES),
            ));
        }
        if !(self.backpressure_threshold > 0.0 && self.backpressure_threshold <= 1.0) {
            return Err(invalid(
                "backpressure_threshold",
                format!("{} is outside (0, 1]", self.backpressure_threshold),
            ));
        }
        if self.memory_budget_units == 0 {
            return Err(invalid(
                "memory_budget_units",
                "must be greater than zero".to_string(),
            ));
        }
        if !(self.max_host_memory_percent > 0.0 && self.max_host_memory_percent <= 100.0) {
            return Err(invalid(
                "max_host_memory_percent",
                format!("{} is outside (0, 100]", self.max_host_memory_percent),
            ));
        }
        if let BackoffStrategy::Exponential { factor, .. } = self.backoff {
            if factor < 1.0 {
                return Err(invalid(
                    "backoff.factor",
                    format!("{} would shrink the delay", factor),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        for kind in OperationKind::ALL {
            assert!(QueueConfig::for_operation(kind).validate().is_ok());
        }
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = QueueConfig::for_operation(OperationKind::Render);
        config.max_concurrent_jobs = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_jobs"));
    }

    #[test]
    fn test_rejects_short_tier_timeout() {
        let mut config = QueueConfig::for_operation(OperationKind::Export);
        config.tiers.premium.base_timeout_ms = 10;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("premium"));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let mut config = QueueConfig::for_operation(OperationKind::Sync);
        config.backpressure_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_deserializes_tagged() {
        let backoff: BackoffStrategy = serde_json::from_value(serde_json::json!({
            "strategy": "exponential",
            "factor": 2.0,
            "max_delay_ms": 60000
        }))
        .unwrap();
        assert_eq!(
            backoff,
            BackoffStrategy::Exponential {
                factor: 2.0,
                max_delay_ms: 60_000
            }
        );
    }
}
