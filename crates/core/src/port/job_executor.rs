// Job Executor Port
// Abstraction for the real work behind a job (rendering, encoding, transfer)

use crate::domain::Job;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// What a successful attempt produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkOutput {
    /// Output descriptor (e.g. `renders/<id>.png`)
    pub descriptor: Option<String>,
}

impl WorkOutput {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: Some(descriptor.into()),
        }
    }
}

/// Execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Work failed: {0}")]
    Failed(String),

    #[error("Work aborted")]
    Aborted,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Job Executor trait
///
/// Implementations must honour `cancel`: once it fires, release resources
/// and return promptly. The queue races every call against its deadline.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Execute one attempt of a job
    ///
    /// # Errors
    /// - ExecutionError::Aborted if `cancel` fired before the work finished
    /// - ExecutionError::Failed / InvalidPayload for anything else
    async fn execute(
        &self,
        job: &Job,
        cancel: CancellationToken,
    ) -> Result<WorkOutput, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Behaviour of a single scripted call
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Succeed immediately
        Success,
        /// Fail with message
        Fail(String),
        /// Succeed after the given delay (aborts if cancelled first)
        Delay(Duration),
        /// Fail after the given delay (aborts if cancelled first)
        FailAfter(Duration, String),
        /// Never finish on its own; resolves only through cancellation
        Hang,
    }

    #[derive(Default)]
    struct Counters {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    /// Executor that replays a script of behaviours, then falls back to a default
    pub struct MockJobExecutor {
        script: Mutex<VecDeque<MockBehavior>>,
        fallback: MockBehavior,
        started: Mutex<Vec<String>>,
        counters: Arc<Counters>,
    }

    impl MockJobExecutor {
        pub fn new(fallback: MockBehavior) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                started: Mutex::new(Vec::new()),
                counters: Arc::new(Counters::default()),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn new_hanging() -> Self {
            Self::new(MockBehavior::Hang)
        }

        /// Queue behaviours consumed one per call before the fallback applies
        pub fn with_script(self, script: impl IntoIterator<Item = MockBehavior>) -> Self {
            self.script.lock().unwrap().extend(script);
            self
        }

        pub fn call_count(&self) -> usize {
            self.counters.calls.load(Ordering::SeqCst)
        }

        /// Highest number of simultaneously running calls observed
        pub fn max_in_flight(&self) -> usize {
            self.counters.max_in_flight.load(Ordering::SeqCst)
        }

        pub fn in_flight(&self) -> usize {
            self.counters.in_flight.load(Ordering::SeqCst)
        }

        /// Job ids in the order their attempts started
        pub fn started_ids(&self) -> Vec<String> {
            self.started.lock().unwrap().clone()
        }
    }

    struct InFlightGuard(Arc<Counters>);

    impl Drop for InFlightGuard {
        fn drop(&mut self) {
            self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl JobExecutor for MockJobExecutor {
        async fn execute(
            &self,
            job: &Job,
            cancel: CancellationToken,
        ) -> Result<WorkOutput, ExecutionError> {
            self.counters.calls.fetch_add(1, Ordering::SeqCst);
            self.started.lock().unwrap().push(job.id.clone());

            let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlightGuard(Arc::clone(&self.counters));

            let behavior = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            match behavior {
                MockBehavior::Success => Ok(WorkOutput::new(format!("mock://{}", job.id))),
                MockBehavior::Fail(msg) => Err(ExecutionError::Failed(msg)),
                MockBehavior::Delay(delay) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => Ok(WorkOutput::new(format!("mock://{}", job.id))),
                        _ = cancel.cancelled() => Err(ExecutionError::Aborted),
                    }
                }
                MockBehavior::FailAfter(delay, msg) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => Err(ExecutionError::Failed(msg)),
                        _ = cancel.cancelled() => Err(ExecutionError::Aborted),
                    }
                }
                MockBehavior::Hang => {
                    cancel.cancelled().await;
                    Err(ExecutionError::Aborted)
                }
            }
        }
    }
}
