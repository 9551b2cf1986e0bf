//! Deadline computation
//!
//! The tier floor and the size-scaled operation timeout are independent lower
//! bounds; the effective deadline is their maximum.

use crate::domain::{CallerTier, QueueConfig};
use std::time::Duration;

/// Cap on size scaling, as a multiple of the operation base timeout
pub const DYNAMIC_TIMEOUT_CAP: u64 = 3;

/// `base * (1 + size/100)`, capped at `DYNAMIC_TIMEOUT_CAP * base`
pub fn dynamic_timeout_ms(base_timeout_ms: u64, payload_size_units: u64) -> u64 {
    let scaled = base_timeout_ms as u128 * (100 + payload_size_units as u128) / 100;
    let cap = base_timeout_ms as u128 * DYNAMIC_TIMEOUT_CAP as u128;
    scaled.min(cap) as u64
}

pub fn effective_timeout_ms(config: &QueueConfig, tier: CallerTier, payload_size_units: u64) -> u64 {
    let tier_floor = config.tiers.get(tier).base_timeout_ms;
    let dynamic = dynamic_timeout_ms(config.base_timeout_ms, payload_size_units);
    tier_floor.max(dynamic)
}

pub fn effective_timeout(config: &QueueConfig, tier: CallerTier, payload_size_units: u64) -> Duration {
    Duration::from_millis(effective_timeout_ms(config, tier, payload_size_units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationKind;

    fn render_config() -> QueueConfig {
        let mut config = QueueConfig::for_operation(OperationKind::Render);
        config.base_timeout_ms = 30_000;
        config.tiers.basic.base_timeout_ms = 30_000;
        config
    }

    #[test]
    fn test_large_basic_job_is_capped() {
        let config = render_config();
        assert_eq!(dynamic_timeout_ms(30_000, 300), 90_000);
        assert_eq!(effective_timeout_ms(&config, CallerTier::Basic, 300), 90_000);
    }

    #[test]
    fn test_scales_linearly_below_cap() {
        assert_eq!(dynamic_timeout_ms(30_000, 0), 30_000);
        assert_eq!(dynamic_timeout_ms(30_000, 50), 45_000);
        assert_eq!(dynamic_timeout_ms(30_000, 200), 90_000);
    }

    #[test]
    fn test_tier_floor_wins_for_small_jobs() {
        let config = render_config();
        assert_eq!(
            effective_timeout_ms(&config, CallerTier::Premium, 0),
            config.tiers.premium.base_timeout_ms
        );
    }

    #[test]
    fn test_monotonic_in_size_and_bounded_below() {
        let config = render_config();
        for tier in [CallerTier::Basic, CallerTier::Standard, CallerTier::Premium] {
            let mut size = 1u64;
            let mut previous = effective_timeout_ms(&config, tier, 0);
            while size < 1_000_000 {
                let timeout = effective_timeout_ms(&config, tier, size);
                assert!(timeout >= config.tiers.get(tier).base_timeout_ms);
                assert!(timeout >= dynamic_timeout_ms(config.base_timeout_ms, size));
                assert!(timeout >= previous);
                previous = timeout;
                size *= 2;
            }
        }
    }
}
