// System probe implementation
// reason: sysinfo for cross-platform memory statistics
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sysinfo::System;
use tracing::{debug, warn};

use atelier_core::port::system_probe::{MemorySnapshot, SystemProbe};

/// System probe implementation using sysinfo
///
/// Only memory is refreshed; admission control never looks at CPU or disks.
/// The refresh is a blocking syscall, so it runs on the blocking pool.
pub struct SystemProbeImpl {
    system: Arc<Mutex<System>>,
}

impl SystemProbeImpl {
    /// Create a new system probe
    ///
    /// # Example
    /// ```ignore
    /// let probe = SystemProbeImpl::new();
    /// ```
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for SystemProbeImpl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemProbe for SystemProbeImpl {
    async fn memory(&self) -> MemorySnapshot {
        let system = Arc::clone(&self.system);
        let refreshed = tokio::task::spawn_blocking(move || refresh(&system)).await;

        match refreshed {
            Ok(snapshot) => {
                debug!(
                    mem_used_mb = snapshot.used_mb,
                    mem_total_mb = snapshot.total_mb,
                    "Memory snapshot collected"
                );
                snapshot
            }
            Err(e) => {
                // Unknown total reads as 0% usage
                warn!(error = %e, "Memory refresh task failed");
                MemorySnapshot {
                    used_mb: 0,
                    total_mb: 0,
                }
            }
        }
    }
}

fn refresh(system: &Mutex<System>) -> MemorySnapshot {
    let mut sys = match system.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("System probe lock poisoned, recovering");
            poisoned.into_inner()
        }
    };

    sys.refresh_memory();

    MemorySnapshot {
        used_mb: sys.used_memory() / 1024 / 1024,
        total_mb: sys.total_memory() / 1024 / 1024,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_snapshot() {
        let probe = SystemProbeImpl::new();
        let snapshot = probe.memory().await;

        // Basic sanity checks
        assert!(snapshot.total_mb > 0);
        assert!(snapshot.used_mb <= snapshot.total_mb);
        let usage = snapshot.usage_percent();
        assert!((0.0..=100.0).contains(&usage));
    }

    #[tokio::test]
    async fn test_concurrent_snapshots_share_one_system() {
        let probe = Arc::new(SystemProbeImpl::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let probe = Arc::clone(&probe);
                tokio::spawn(async move { probe.memory().await })
            })
            .collect();

        for handle in handles {
            let snapshot = handle.await.unwrap();
            assert!(snapshot.total_mb > 0);
        }
    }
}
