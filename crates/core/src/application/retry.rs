// Retry logic
use crate::domain::{BackoffStrategy, Job, QueueConfig};
use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue the job and trigger dispatch after this delay
    Retry(Duration),
    /// Retry budget spent, finalize as failed
    Exhausted,
}

/// Retry policy
///
/// Determines if a failed attempt should be retried based on:
/// - Attempts made so far (counted on every start)
/// - `max_retries` from the queue config
/// - The configured backoff strategy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay_ms: u64,
    strategy: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, strategy: BackoffStrategy) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            strategy,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff_ms, config.backoff)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide what happens to a job whose attempt just failed
    ///
    /// Cancellation never reaches this point; it finalizes directly.
    pub fn should_retry(&self, job: &Job) -> RetryDecision {
        if job.attempts >= self.max_retries {
            warn!(
                job_id = %job.id,
                attempts = job.attempts,
                max_retries = self.max_retries,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        let delay_ms = self.delay_ms(job);

        info!(
            job_id = %job.id,
            attempt = job.attempts,
            max_retries = self.max_retries,
            delay_ms = delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(Duration::from_millis(delay_ms))
    }

    fn delay_ms(&self, job: &Job) -> u64 {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Exponential {
                factor,
                max_delay_ms,
            } => {
                // delay = base * factor^(attempt - 1), capped
                let exponent = job.attempts.saturating_sub(1) as i32;
                let raw = self.base_delay_ms as f64 * factor.powi(exponent);
                let capped = raw.min(max_delay_ms as f64);

                // ±10% jitter, seeded by job id so it is deterministic per job
                let jitter_seed = job.id.chars().map(|c| c as u32).sum::<u32>();
                let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

                (capped * jitter_factor) as u64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallerTier, OperationKind};

    fn job_with_attempts(id: &str, attempts: u32) -> Job {
        let mut job = Job::new(
            id,
            0,
            OperationKind::Export,
            CallerTier::Standard,
            10,
            50,
            serde_json::json!({}),
        );
        job.attempts = attempts;
        job
    }

    #[test]
    fn test_fixed_backoff_until_budget_spent() {
        let policy = RetryPolicy::new(3, 500, BackoffStrategy::Fixed);

        assert_eq!(
            policy.should_retry(&job_with_attempts("a", 1)),
            RetryDecision::Retry(Duration::from_millis(500))
        );
        assert_eq!(
            policy.should_retry(&job_with_attempts("a", 2)),
            RetryDecision::Retry(Duration::from_millis(500))
        );
        assert_eq!(
            policy.should_retry(&job_with_attempts("a", 3)),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn test_exponential_backoff_grows_within_jitter() {
        let policy = RetryPolicy::new(
            10,
            1_000,
            BackoffStrategy::Exponential {
                factor: 2.0,
                max_delay_ms: 5_000,
            },
        );

        let delay = |attempts| match policy.should_retry(&job_with_attempts("job-x", attempts)) {
            RetryDecision::Retry(d) => d.as_millis() as u64,
            RetryDecision::Exhausted => panic!("unexpected exhaustion"),
        };

        let first = delay(1);
        assert!((900..=1_100).contains(&first), "first = {}", first);

        let third = delay(3);
        assert!((3_600..=4_400).contains(&third), "third = {}", third);

        let capped = delay(8);
        assert!(capped <= 5_500, "capped = {}", capped);
    }

    #[test]
    fn test_jitter_is_deterministic_per_job() {
        let policy = RetryPolicy::new(
            5,
            1_000,
            BackoffStrategy::Exponential {
                factor: 2.0,
                max_delay_ms: 60_000,
            },
        );
        let job = job_with_attempts("same-id", 2);
        assert_eq!(policy.should_retry(&job), policy.should_retry(&job));
    }
}
