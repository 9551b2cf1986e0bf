// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod queue;
pub mod result;

// Re-exports
pub use error::DomainError;
pub use job::{CallerTier, Job, JobId, JobState, OperationKind, Priority};
pub use queue::{BackoffStrategy, ConfigError, QueueConfig, TierLimits, TierTable};
pub use result::{JobError, JobResult, ResultStatus};
