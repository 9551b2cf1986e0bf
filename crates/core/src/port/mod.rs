// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_executor;
pub mod system_probe;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_executor::{ExecutionError, JobExecutor, WorkOutput};
pub use system_probe::{MemorySnapshot, SystemProbe};
pub use time_provider::TimeProvider;
