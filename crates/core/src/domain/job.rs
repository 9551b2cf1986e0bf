// Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Priority score, 0..=100 (higher number = served sooner)
pub type Priority = u8;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Kind of work a queue instance performs. One queue per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Render,
    Export,
    Sync,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Render,
        OperationKind::Export,
        OperationKind::Sync,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Render => "render",
            OperationKind::Export => "export",
            OperationKind::Sync => "sync",
        }
    }

    /// Name of the timeout failure class for this operation (e.g. `RenderTimeout`)
    pub fn timeout_label(self) -> &'static str {
        match self {
            OperationKind::Render => "RenderTimeout",
            OperationKind::Export => "ExportTimeout",
            OperationKind::Sync => "SyncTimeout",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "render" => Ok(OperationKind::Render),
            "export" => Ok(OperationKind::Export),
            "sync" => Ok(OperationKind::Sync),
            other => Err(DomainError::UnknownOperation(other.to_string())),
        }
    }
}

/// Caller service level. Drives priority weight and timeout floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerTier {
    Basic,
    Standard,
    Premium,
}

impl CallerTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CallerTier::Basic => "basic",
            CallerTier::Standard => "standard",
            CallerTier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for CallerTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallerTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(CallerTier::Basic),
            "standard" => Ok(CallerTier::Standard),
            "premium" => Ok(CallerTier::Premium),
            other => Err(DomainError::UnknownTier(other.to_string())),
        }
    }
}

/// Job Entity
///
/// Owned by the queue after submission; only the queue's dispatcher drives
/// state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub operation: OperationKind,
    pub caller_tier: CallerTier,
    pub payload_size_units: u64,
    pub priority: Priority,
    pub state: JobState,
    pub attempts: u32,

    pub submitted_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,

    /// Opaque caller data handed to the executor
    pub payload: serde_json::Value,
}

impl Job {
    /// Create a new queued job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `submitted_at` - Submission timestamp in epoch ms (injected, not system time)
    /// * `priority` - Precomputed priority; never changes afterwards
    pub fn new(
        id: impl Into<String>,
        submitted_at: i64,
        operation: OperationKind,
        caller_tier: CallerTier,
        payload_size_units: u64,
        priority: Priority,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            operation,
            caller_tier,
            payload_size_units,
            priority,
            state: JobState::Queued,
            attempts: 0,
            submitted_at,
            started_at: None,
            completed_at: None,
            payload,
        }
    }

    /// Queued -> Running. The only place `attempts` increases.
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Running.to_string(),
            });
        }
        self.state = JobState::Running;
        self.attempts += 1;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Running -> Queued (retry)
    pub fn requeue(&mut self) -> Result<()> {
        if self.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Queued.to_string(),
            });
        }
        self.state = JobState::Queued;
        self.started_at = None;
        Ok(())
    }

    /// Running -> terminal state
    pub fn finish(&mut self, terminal: JobState, now_millis: i64) -> Result<()> {
        if self.state != JobState::Running || !terminal.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: terminal.to_string(),
            });
        }
        self.state = terminal;
        self.completed_at = Some(now_millis);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            "job-1",
            1000,
            OperationKind::Render,
            CallerTier::Basic,
            10,
            30,
            serde_json::json!({}),
        )
    }

    #[test]
    fn test_lifecycle_counts_attempts_on_start_only() {
        let mut job = job();
        assert_eq!(job.attempts, 0);

        job.start(2000).unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.started_at, Some(2000));

        job.requeue().unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.state, JobState::Queued);
        assert!(job.started_at.is_none());

        job.start(3000).unwrap();
        assert_eq!(job.attempts, 2);

        job.finish(JobState::Completed, 4000).unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.completed_at, Some(4000));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut job = job();
        assert!(job.requeue().is_err());
        assert!(job.finish(JobState::Completed, 1).is_err());

        job.start(1).unwrap();
        assert!(job.start(2).is_err());
        assert!(job.finish(JobState::Running, 2).is_err());
    }

    #[test]
    fn test_parse_tier_and_operation() {
        assert_eq!("Premium".parse::<CallerTier>().unwrap(), CallerTier::Premium);
        assert_eq!("sync".parse::<OperationKind>().unwrap(), OperationKind::Sync);
        assert!("gold".parse::<CallerTier>().is_err());
        assert_eq!(OperationKind::Export.timeout_label(), "ExportTimeout");
    }
}
