// System resource monitoring port
// reason: async-trait so adapters may refresh host stats off the hot path
use async_trait::async_trait;

/// Host memory reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySnapshot {
    pub used_mb: u64,
    pub total_mb: u64,
}

impl MemorySnapshot {
    pub fn usage_percent(&self) -> f32 {
        if self.total_mb == 0 {
            return 0.0;
        }
        (self.used_mb as f64 / self.total_mb as f64 * 100.0) as f32
    }
}

/// System probe port, consulted by admission control
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Current host memory usage
    async fn memory(&self) -> MemorySnapshot;
}

/// Probe that always reports an idle host (used when no adapter is wired)
pub struct NoopSystemProbe;

#[async_trait]
impl SystemProbe for NoopSystemProbe {
    async fn memory(&self) -> MemorySnapshot {
        MemorySnapshot {
            used_mb: 0,
            total_mb: 0,
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Mock SystemProbe with adjustable memory usage
    pub struct MockSystemProbe {
        snapshot: Mutex<MemorySnapshot>,
    }

    impl MockSystemProbe {
        pub fn new(usage_percent: f32) -> Self {
            let probe = Self {
                snapshot: Mutex::new(MemorySnapshot {
                    used_mb: 0,
                    total_mb: 1000,
                }),
            };
            probe.set_usage_percent(usage_percent);
            probe
        }

        pub fn set_usage_percent(&self, usage_percent: f32) {
            self.snapshot.lock().unwrap().used_mb = (usage_percent * 10.0) as u64;
        }
    }

    #[async_trait]
    impl SystemProbe for MockSystemProbe {
        async fn memory(&self) -> MemorySnapshot {
            *self.snapshot.lock().unwrap()
        }
    }
}
