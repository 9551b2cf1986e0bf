// Dispatcher - single owner of queue state
//
// Producers send commands; attempts and retry timers send events. Both are
// consumed here one at a time, so every state transition is serialized and
// dispatch never recurses.

use super::execution::{self, AttemptOutcome};
use super::state::{DispatchGate, QueueState};
use super::view::{JobStatusView, QueueMetrics};
use crate::application::admission::{self, AdmissionError, SubmitRequest};
use crate::application::priority::compute_priority;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::application::timeout::effective_timeout;
use crate::domain::{Job, JobError, JobId, JobResult, QueueConfig, ResultStatus};
use crate::port::{IdProvider, JobExecutor, SystemProbe, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Requests from queue handles
pub(crate) enum Command {
    Submit {
        request: SubmitRequest,
        reply: oneshot::Sender<Result<JobId, AdmissionError>>,
    },
    Cancel {
        id: JobId,
        reply: oneshot::Sender<bool>,
    },
    Status {
        id: JobId,
        reply: oneshot::Sender<Option<JobStatusView>>,
    },
    Metrics {
        reply: oneshot::Sender<QueueMetrics>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Internal triggers
#[derive(Debug)]
pub(crate) enum Event {
    AttemptFinished {
        id: JobId,
        attempt: u32,
        outcome: AttemptOutcome,
    },
    RetryTimerElapsed {
        id: JobId,
    },
}

pub(crate) struct Dispatcher {
    config: Arc<QueueConfig>,
    state: QueueState,
    retry_policy: RetryPolicy,
    executor: Arc<dyn JobExecutor>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    system_probe: Arc<dyn SystemProbe>,
    events_tx: mpsc::UnboundedSender<Event>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<QueueConfig>,
        executor: Arc<dyn JobExecutor>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        system_probe: Arc<dyn SystemProbe>,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            state: QueueState::new(&config),
            retry_policy: RetryPolicy::from_config(&config),
            config,
            executor,
            time_provider,
            id_provider,
            system_probe,
            events_tx,
        }
    }

    /// Event loop. Ends on shutdown or when every handle is dropped.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        info!(
            operation = %self.config.operation,
            max_concurrent = self.config.max_concurrent_jobs,
            depth_limit = self.config.queue_depth_limit,
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.handle_event(event),
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
            }
        }

        info!(operation = %self.config.operation, "Dispatcher stopped");
    }

    /// Returns false once the dispatcher should stop
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Submit { request, reply } => {
                let result = self.submit(request).await;
                let _ = reply.send(result);
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.cancel(&id));
            }
            Command::Status { id, reply } => {
                let _ = reply.send(self.state.status(&id));
            }
            Command::Metrics { reply } => {
                let _ = reply.send(self.state.metrics(&self.config));
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::AttemptFinished {
                id,
                attempt,
                outcome,
            } => self.on_attempt_finished(id, attempt, outcome),
            Event::RetryTimerElapsed { id } => {
                if self.state.release_backoff(&id) {
                    debug!(job_id = %id, "Retry backoff elapsed");
                }
            }
        }
        self.try_dispatch();
    }

    async fn submit(&mut self, request: SubmitRequest) -> Result<JobId, AdmissionError> {
        let host_memory = self.system_probe.memory().await;
        if let Err(e) = admission::admit(&self.config, self.state.occupancy(), &request, host_memory)
        {
            warn!(
                operation = %self.config.operation,
                tier = %request.caller_tier,
                size = request.payload_size_units,
                reason = e.reason_code(),
                "Submission rejected"
            );
            return Err(e);
        }

        let id = self.id_provider.generate_id();
        let priority = compute_priority(request.caller_tier, request.payload_size_units);
        let job = Job::new(
            id.clone(),
            self.time_provider.now_millis(),
            self.config.operation,
            request.caller_tier,
            request.payload_size_units,
            priority,
            request.payload,
        );

        let position = self.state.insert_by_priority(job);
        info!(
            job_id = %id,
            operation = %self.config.operation,
            tier = %request.caller_tier,
            size = request.payload_size_units,
            priority = priority,
            position = position,
            "Job accepted"
        );

        self.try_dispatch();
        Ok(id)
    }

    fn cancel(&mut self, id: &str) -> bool {
        if self.state.remove_waiting(id).is_some() {
            info!(job_id = %id, "Cancelled waiting job");
            return true;
        }

        match self.state.active_mut(id) {
            Some(active) if !active.cancel_requested => {
                active.cancel_requested = true;
                active.token.cancel();
                info!(job_id = %id, "Cancellation signalled to running job");
                true
            }
            _ => false,
        }
    }

    /// Start as many waiting jobs as capacity and backpressure allow
    fn try_dispatch(&mut self) {
        loop {
            match self.state.dispatch_gate() {
                DispatchGate::Ready => {}
                DispatchGate::Idle | DispatchGate::AtCapacity | DispatchGate::BackingOff => return,
                DispatchGate::Backpressure { pressure } => {
                    debug!(
                        operation = %self.config.operation,
                        pressure = pressure,
                        "Dispatch deferred under backpressure"
                    );
                    return;
                }
            }

            let Some(mut job) = self.state.pop_next() else {
                return;
            };

            if let Err(e) = job.start(self.time_provider.now_millis()) {
                error!(job_id = %job.id, error = %e, "Waiting job could not be started");
                let reason = JobError::ExecutionFailed {
                    message: e.to_string(),
                };
                self.finalize(job, ResultStatus::Failed, None, Some(reason));
                continue;
            }

            let timeout = effective_timeout(&self.config, job.caller_tier, job.payload_size_units);
            let token = CancellationToken::new();

            info!(
                job_id = %job.id,
                operation = %job.operation,
                attempt = job.attempts,
                priority = job.priority,
                timeout_ms = timeout.as_millis() as u64,
                "Dispatching job"
            );

            execution::spawn_attempt(
                Arc::clone(&self.executor),
                Arc::new(job.clone()),
                token.clone(),
                timeout,
                self.events_tx.clone(),
            );
            self.state.activate(job, token);
        }
    }

    fn on_attempt_finished(&mut self, id: JobId, attempt: u32, outcome: AttemptOutcome) {
        // A late event for an attempt that is no longer active is a no-op
        let current = self.state.active(&id).map(|a| a.job.attempts);
        if current != Some(attempt) {
            debug!(job_id = %id, attempt = attempt, "Ignoring stale attempt event");
            return;
        }
        let Some(active) = self.state.take_active(&id) else {
            return;
        };
        let job = active.job;

        let error = match outcome {
            AttemptOutcome::Succeeded(output) => {
                self.finalize(job, ResultStatus::Completed, output.descriptor, None);
                return;
            }
            AttemptOutcome::Cancelled => {
                self.finalize(job, ResultStatus::Cancelled, None, Some(JobError::Cancelled));
                return;
            }
            AttemptOutcome::TimedOut { after_ms } => JobError::Timeout {
                operation: job.operation,
                after_ms,
            },
            AttemptOutcome::Failed(message) => JobError::ExecutionFailed { message },
        };

        if active.cancel_requested {
            // Cancellation raced a failure; cancellation wins and skips retry
            self.finalize(job, ResultStatus::Cancelled, None, Some(JobError::Cancelled));
            return;
        }

        self.on_failure(job, error);
    }

    fn on_failure(&mut self, mut job: Job, error: JobError) {
        match self.retry_policy.should_retry(&job) {
            RetryDecision::Retry(delay) => {
                warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, requeueing at front"
                );
                if let Err(e) = job.requeue() {
                    error!(job_id = %job.id, error = %e, "Requeue rejected");
                    self.finalize(job, ResultStatus::Failed, None, Some(error));
                    return;
                }
                let id = job.id.clone();
                self.state.push_front(job);
                self.schedule_retry_trigger(id, delay);
            }
            RetryDecision::Exhausted => {
                let status = if error.is_timeout() {
                    ResultStatus::Timeout
                } else {
                    ResultStatus::Failed
                };
                let wrapped = JobError::RetriesExhausted {
                    attempts: job.attempts,
                    last: Box::new(error),
                };
                self.finalize(job, status, None, Some(wrapped));
            }
        }
    }

    fn schedule_retry_trigger(&self, id: JobId, delay: Duration) {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::RetryTimerElapsed { id });
        });
    }

    fn finalize(
        &mut self,
        mut job: Job,
        status: ResultStatus,
        output: Option<String>,
        error: Option<JobError>,
    ) {
        let now = self.time_provider.now_millis();
        if let Err(e) = job.finish(status.job_state(), now) {
            error!(job_id = %job.id, error = %e, "Unexpected state while finalizing");
        }

        let result = JobResult::from_job(&job, status, output, error, now);
        match status {
            ResultStatus::Completed => info!(
                job_id = %result.id,
                attempts = result.attempts,
                run_ms = result.run_ms,
                queue_wait_ms = result.queue_wait_ms,
                "Job completed"
            ),
            ResultStatus::Cancelled => info!(job_id = %result.id, "Job cancelled"),
            ResultStatus::Failed | ResultStatus::Timeout => error!(
                job_id = %result.id,
                status = %status,
                attempts = result.attempts,
                error = ?result.error,
                "Job failed permanently"
            ),
        }
        self.state.record(result);
    }

    fn shutdown(&mut self) {
        let (cancelled, dropped) = self.state.abort_all();
        info!(
            operation = %self.config.operation,
            cancelled_running = cancelled,
            dropped_waiting = dropped,
            "Dispatcher shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallerTier, JobState, OperationKind};
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_executor::mocks::MockJobExecutor;
    use crate::port::system_probe::NoopSystemProbe;
    use crate::port::time_provider::mocks::FixedTimeProvider;

    fn dispatcher() -> Dispatcher {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        Dispatcher::new(
            Arc::new(QueueConfig::for_operation(OperationKind::Render)),
            Arc::new(MockJobExecutor::new_success()),
            Arc::new(FixedTimeProvider::new(5_000)),
            Arc::new(SequentialIdProvider::new("job")),
            Arc::new(NoopSystemProbe),
            events_tx,
        )
    }

    #[test]
    fn test_unstartable_job_is_recorded_as_failed() {
        let mut dispatcher = dispatcher();
        let mut job = Job::new(
            "stuck",
            1_000,
            OperationKind::Render,
            CallerTier::Basic,
            1,
            30,
            serde_json::Value::Null,
        );
        job.state = JobState::Completed;
        dispatcher.state.insert_by_priority(job);

        dispatcher.try_dispatch();

        match dispatcher.state.status("stuck") {
            Some(JobStatusView::Finished { result }) => {
                assert_eq!(result.status, ResultStatus::Failed);
                assert!(matches!(result.error, Some(JobError::ExecutionFailed { .. })));
            }
            other => panic!("expected a finished job, got {:?}", other),
        }
        let metrics = dispatcher.state.metrics(&dispatcher.config);
        assert_eq!(metrics.queue_depth, 0);
        assert_eq!(metrics.active_count, 0);
        assert_eq!(metrics.failed_count, 1);
    }
}
