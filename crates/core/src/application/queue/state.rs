// Queue State - waiting sequence, active set and terminal store
//
// Owned exclusively by the dispatcher task; nothing here is shared.

use super::view::{JobStatusView, QueueMetrics};
use crate::application::admission::Occupancy;
use crate::domain::{Job, JobId, JobResult, QueueConfig, ResultStatus};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio_util::sync::CancellationToken;

/// A job currently executing
#[derive(Debug)]
pub(crate) struct ActiveJob {
    pub job: Job,
    pub token: CancellationToken,
    pub cancel_requested: bool,
}

/// Outcome of the dispatch gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DispatchGate {
    Ready,
    Idle,
    AtCapacity,
    /// Every waiting job is a retry still inside its backoff
    BackingOff,
    Backpressure { pressure: f64 },
}

#[derive(Debug, Default)]
struct Counters {
    completed: u64,
    failed: u64,
    timeout: u64,
    cancelled: u64,
}

#[derive(Debug)]
pub(crate) struct QueueState {
    max_concurrent: usize,
    depth_limit: usize,
    backpressure_threshold: f64,
    waiting: VecDeque<Job>,
    active: HashMap<JobId, ActiveJob>,
    backing_off: HashSet<JobId>,
    results: HashMap<JobId, JobResult>,
    counters: Counters,
}

impl QueueState {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent_jobs,
            depth_limit: config.queue_depth_limit,
            backpressure_threshold: config.backpressure_threshold,
            waiting: VecDeque::new(),
            active: HashMap::new(),
            backing_off: HashSet::new(),
            results: HashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn occupancy(&self) -> Occupancy {
        let waiting_units: u64 = self.waiting.iter().map(|j| j.payload_size_units).sum();
        let active_units: u64 = self.active.values().map(|a| a.job.payload_size_units).sum();
        Occupancy {
            waiting: self.waiting.len(),
            in_flight_units: waiting_units.saturating_add(active_units),
        }
    }

    /// Stable insertion: before the first entry with strictly lower priority
    pub fn insert_by_priority(&mut self, job: Job) -> usize {
        let position = self
            .waiting
            .iter()
            .position(|queued| queued.priority < job.priority)
            .unwrap_or(self.waiting.len());
        self.waiting.insert(position, job);
        position
    }

    /// Retries jump ahead of everything waiting. Until `release_backoff` the
    /// retry is skipped and the jobs behind it may still be dispatched.
    pub fn push_front(&mut self, job: Job) {
        self.backing_off.insert(job.id.clone());
        self.waiting.push_front(job);
    }

    /// Backoff elapsed; the job may be dispatched again
    pub fn release_backoff(&mut self, id: &str) -> bool {
        self.backing_off.remove(id)
    }

    /// `max(active / max_concurrent, waiting / depth_limit)`, both in [0, 1]
    pub fn pressure(&self) -> f64 {
        let active = self.active.len() as f64 / self.max_concurrent as f64;
        let waiting = self.waiting.len() as f64 / self.depth_limit as f64;
        active.max(waiting)
    }

    pub fn dispatch_gate(&self) -> DispatchGate {
        if self.waiting.is_empty() {
            return DispatchGate::Idle;
        }
        if self.active.len() >= self.max_concurrent {
            return DispatchGate::AtCapacity;
        }
        if self.next_eligible().is_none() {
            return DispatchGate::BackingOff;
        }
        // With nothing running there is no completion left to re-trigger
        // dispatch, so backpressure only applies while work is in flight.
        let pressure = self.pressure();
        if pressure > self.backpressure_threshold && !self.active.is_empty() {
            return DispatchGate::Backpressure { pressure };
        }
        DispatchGate::Ready
    }

    /// Remove the first waiting job that is not held by a backoff
    pub fn pop_next(&mut self) -> Option<Job> {
        let index = self.next_eligible()?;
        self.waiting.remove(index)
    }

    fn next_eligible(&self) -> Option<usize> {
        self.waiting
            .iter()
            .position(|job| !self.backing_off.contains(&job.id))
    }

    pub fn activate(&mut self, job: Job, token: CancellationToken) {
        self.active.insert(
            job.id.clone(),
            ActiveJob {
                job,
                token,
                cancel_requested: false,
            },
        );
    }

    pub fn remove_waiting(&mut self, id: &str) -> Option<Job> {
        let index = self.waiting.iter().position(|job| job.id == id)?;
        self.backing_off.remove(id);
        self.waiting.remove(index)
    }

    pub fn active(&self, id: &str) -> Option<&ActiveJob> {
        self.active.get(id)
    }

    pub fn active_mut(&mut self, id: &str) -> Option<&mut ActiveJob> {
        self.active.get_mut(id)
    }

    pub fn take_active(&mut self, id: &str) -> Option<ActiveJob> {
        self.active.remove(id)
    }

    /// Cancel every in-flight attempt and drop all waiting work
    pub fn abort_all(&mut self) -> (usize, usize) {
        for active in self.active.values_mut() {
            active.cancel_requested = true;
            active.token.cancel();
        }
        let dropped = self.waiting.len();
        self.waiting.clear();
        self.backing_off.clear();
        (self.active.len(), dropped)
    }

    pub fn record(&mut self, result: JobResult) {
        match result.status {
            ResultStatus::Completed => self.counters.completed += 1,
            ResultStatus::Failed => self.counters.failed += 1,
            ResultStatus::Timeout => self.counters.timeout += 1,
            ResultStatus::Cancelled => self.counters.cancelled += 1,
        }
        self.results.insert(result.id.clone(), result);
    }

    /// Lookup order: active, waiting, terminal
    pub fn status(&self, id: &str) -> Option<JobStatusView> {
        if let Some(active) = self.active.get(id) {
            return Some(JobStatusView::Running {
                job: active.job.clone(),
            });
        }
        if let Some((position, job)) = self.waiting.iter().enumerate().find(|(_, j)| j.id == id) {
            return Some(JobStatusView::Waiting {
                job: job.clone(),
                position,
            });
        }
        self.results
            .get(id)
            .map(|result| JobStatusView::Finished {
                result: result.clone(),
            })
    }

    pub fn metrics(&self, config: &QueueConfig) -> QueueMetrics {
        let active_count = self.active.len();
        QueueMetrics {
            operation: config.operation,
            queue_depth: self.waiting.len(),
            active_count,
            max_concurrent: self.max_concurrent,
            utilization_percent: active_count as f64 / self.max_concurrent as f64 * 100.0,
            completed_count: self.counters.completed,
            failed_count: self.counters.failed,
            timeout_count: self.counters.timeout,
            cancelled_count: self.counters.cancelled,
        }
    }

    #[cfg(test)]
    pub fn waiting_ids(&self) -> Vec<String> {
        self.waiting.iter().map(|j| j.id.clone()).collect()
    }
}
