//! Priority scoring
//!
//! `priority = clamp(tier_base_score + size_bonus, 0, 100)`. Smaller payloads
//! get a bonus of at most `MAX_SIZE_BONUS`, which is kept below one tier step
//! so a job can never overtake the next tier on size alone.

use crate::domain::{CallerTier, Priority};

/// Largest priority value
pub const MAX_PRIORITY: Priority = 100;

/// Distance between adjacent tier base scores
pub const TIER_STEP: u32 = 30;

/// Bonus granted to an empty payload
pub const MAX_SIZE_BONUS: u32 = 10;

/// Payload size at and above which no bonus is granted
pub const SIZE_BONUS_CUTOFF_UNITS: u64 = 100;

pub fn tier_base_score(tier: CallerTier) -> u32 {
    match tier {
        CallerTier::Basic => 20,
        CallerTier::Standard => 20 + TIER_STEP,
        CallerTier::Premium => 20 + 2 * TIER_STEP,
    }
}

/// Linear bonus: `MAX_SIZE_BONUS` at size 0, zero at `SIZE_BONUS_CUTOFF_UNITS`
pub fn size_bonus(payload_size_units: u64) -> u32 {
    let size = payload_size_units.min(SIZE_BONUS_CUTOFF_UNITS);
    let remaining = SIZE_BONUS_CUTOFF_UNITS - size;
    (remaining * MAX_SIZE_BONUS as u64 / SIZE_BONUS_CUTOFF_UNITS) as u32
}

/// Priority assigned once at submission
pub fn compute_priority(tier: CallerTier, payload_size_units: u64) -> Priority {
    let score = tier_base_score(tier) + size_bonus(payload_size_units);
    score.min(MAX_PRIORITY as u32) as Priority
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bonus_monotonically_decreasing() {
        let mut previous = size_bonus(0);
        assert_eq!(previous, MAX_SIZE_BONUS);
        for size in [1, 5, 10, 50, 99, 100, 1_000, u64::MAX] {
            let bonus = size_bonus(size);
            assert!(bonus <= previous, "bonus grew at size {}", size);
            previous = bonus;
        }
        assert_eq!(size_bonus(100), 0);
        assert_eq!(size_bonus(50), 5);
    }

    #[test]
    fn test_bonus_never_crosses_tier_step() {
        let smallest_basic = compute_priority(CallerTier::Basic, 0);
        let largest_standard = compute_priority(CallerTier::Standard, u64::MAX);
        assert!(smallest_basic < largest_standard);

        let smallest_standard = compute_priority(CallerTier::Standard, 0);
        let largest_premium = compute_priority(CallerTier::Premium, u64::MAX);
        assert!(smallest_standard < largest_premium);
    }

    #[test]
    fn test_priority_within_bounds() {
        for tier in [CallerTier::Basic, CallerTier::Standard, CallerTier::Premium] {
            for size in [0, 10, 100, 10_000] {
                assert!(compute_priority(tier, size) <= MAX_PRIORITY);
            }
        }
        assert_eq!(compute_priority(CallerTier::Premium, 0), 90);
        assert_eq!(compute_priority(CallerTier::Basic, 300), 20);
    }
}
