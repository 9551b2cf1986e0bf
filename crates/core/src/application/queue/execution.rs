// Timed execution of a single attempt
//
// Each attempt races the executor against its deadline and the job's
// cancellation token. Whatever resolves first is reported to the dispatcher
// exactly once; the losers are aborted.

use super::dispatcher::Event;
use crate::domain::Job;
use crate::port::{ExecutionError, JobExecutor, WorkOutput};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How one attempt ended
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttemptOutcome {
    Succeeded(WorkOutput),
    Failed(String),
    TimedOut { after_ms: u64 },
    Cancelled,
}

/// Spawn an attempt; its outcome arrives later as `Event::AttemptFinished`
pub(crate) fn spawn_attempt(
    executor: Arc<dyn JobExecutor>,
    job: Arc<Job>,
    token: CancellationToken,
    timeout: Duration,
    events: mpsc::UnboundedSender<Event>,
) {
    tokio::spawn(async move {
        let outcome = run_attempt(executor, Arc::clone(&job), token, timeout).await;
        let event = Event::AttemptFinished {
            id: job.id.clone(),
            attempt: job.attempts,
            outcome,
        };
        if events.send(event).is_err() {
            debug!(job_id = %job.id, "Dispatcher stopped before attempt finished");
        }
    });
}

pub(crate) async fn run_attempt(
    executor: Arc<dyn JobExecutor>,
    job: Arc<Job>,
    token: CancellationToken,
    timeout: Duration,
) -> AttemptOutcome {
    // Separate task so an executor panic surfaces as a JoinError instead of
    // taking the attempt down silently
    let mut work = {
        let job = Arc::clone(&job);
        let token = token.clone();
        tokio::spawn(async move { executor.execute(&job, token).await })
    };

    tokio::select! {
        biased;
        joined = &mut work => match joined {
            Ok(Ok(output)) => AttemptOutcome::Succeeded(output),
            Ok(Err(ExecutionError::Aborted)) if token.is_cancelled() => AttemptOutcome::Cancelled,
            Ok(Err(e)) => AttemptOutcome::Failed(e.to_string()),
            Err(join_err) => {
                error!(job_id = %job.id, error = ?join_err, "Executor task panicked");
                AttemptOutcome::Failed(format!("executor panicked: {}", join_err))
            }
        },
        _ = token.cancelled() => {
            work.abort();
            AttemptOutcome::Cancelled
        }
        _ = tokio::time::sleep(timeout) => {
            let after_ms = timeout.as_millis() as u64;
            warn!(
                job_id = %job.id,
                operation = %job.operation,
                timeout_ms = after_ms,
                "Attempt exceeded deadline, aborting"
            );
            token.cancel();
            work.abort();
            AttemptOutcome::TimedOut { after_ms }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallerTier, OperationKind};
    use crate::port::job_executor::mocks::{MockBehavior, MockJobExecutor};

    fn job() -> Arc<Job> {
        let mut job = Job::new(
            "exec-1",
            0,
            OperationKind::Render,
            CallerTier::Basic,
            1,
            30,
            serde_json::Value::Null,
        );
        job.start(0).unwrap();
        Arc::new(job)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_within_deadline() {
        let executor = Arc::new(MockJobExecutor::new(MockBehavior::Delay(
            Duration::from_millis(100),
        )));
        let outcome = run_attempt(
            executor,
            job(),
            CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(outcome, AttemptOutcome::Succeeded(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_and_signals_token() {
        let executor = Arc::new(MockJobExecutor::new_hanging());
        let token = CancellationToken::new();
        let outcome = run_attempt(
            executor,
            job(),
            token.clone(),
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(outcome, AttemptOutcome::TimedOut { after_ms: 500 });
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_cancel_is_not_a_timeout() {
        let executor = Arc::new(MockJobExecutor::new_hanging());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let outcome = run_attempt(executor, job(), token, Duration::from_secs(60)).await;
        assert_eq!(outcome, AttemptOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let executor = Arc::new(MockJobExecutor::new_fail("codec error"));
        let outcome = run_attempt(
            executor,
            job(),
            CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(
            outcome,
            AttemptOutcome::Failed("Work failed: codec error".to_string())
        );
    }
}
