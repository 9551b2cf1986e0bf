// Application Layer - Use Cases and Business Logic

pub mod admission;
pub mod constants;
pub mod health;
pub mod priority;
pub mod queue;
pub mod retry;
pub mod services;
pub mod shutdown;
pub mod timeout;

// Re-exports
pub use admission::{AdmissionError, SubmitRequest};
pub use health::{HealthLevel, HealthReporter};
pub use queue::{JobQueue, JobQueueBuilder, JobStatusView, QueueMetrics};
pub use retry::{RetryDecision, RetryPolicy};
pub use services::JobServices;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
