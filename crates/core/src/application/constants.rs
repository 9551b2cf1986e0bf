// Queue engine constants (no magic values)
use std::time::Duration;

/// Pending commands per queue before `submit` callers wait for room
pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;

/// Interval between health reports (30s)
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Utilization at which the health reporter marks a queue as degraded (percent)
pub const DEGRADED_UTILIZATION_PERCENT: f64 = 90.0;

/// Upper bound on how long `JobServices::shutdown_all` waits per queue (5s)
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
