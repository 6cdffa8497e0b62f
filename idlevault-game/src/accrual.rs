//! Elapsed-time to reward conversion.
use serde::Serialize;

use crate::config::RateConfig;
use crate::constants::SECONDS_PER_MINUTE;
use crate::ledger::Grant;
use crate::numbers::{floor_f64_to_i64, non_negative_seconds};

/// Rewards derived from one reading of the duration source. Recomputed on
/// demand and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccrualSnapshot {
    pub elapsed_seconds: f64,
    pub earned_minutes: i64,
    pub coin_amount: i64,
    pub hammer_amount: i64,
    pub can_collect: bool,
    /// Progress through the current minute in `[0, 1]`, shared by every
    /// resource bar regardless of its rate.
    pub minute_progress01: f64,
}

impl AccrualSnapshot {
    /// Amounts a collection of this snapshot would grant.
    #[must_use]
    pub const fn grant(&self) -> Grant {
        Grant {
            coins: self.coin_amount,
            hammers: self.hammer_amount,
        }
    }

    /// Elapsed time truncated to whole seconds.
    #[must_use]
    pub fn whole_seconds(&self) -> i64 {
        floor_f64_to_i64(self.elapsed_seconds)
    }
}

/// Convert elapsed seconds into whole-minute rewards and the collect gate.
#[must_use]
pub fn snapshot(elapsed_seconds: f64, rates: &RateConfig) -> AccrualSnapshot {
    let elapsed_seconds = non_negative_seconds(elapsed_seconds);
    let earned_minutes = floor_f64_to_i64(elapsed_seconds / SECONDS_PER_MINUTE).max(0);

    // Rates are validated at load time; clamp anyway so a bad config can
    // never produce a negative grant.
    let coin_amount = earned_minutes.saturating_mul(rates.coin_per_minute).max(0);
    let hammer_amount = earned_minutes.saturating_mul(rates.hammer_per_minute).max(0);

    let has_reward = coin_amount > 0 || hammer_amount > 0;
    let can_collect = has_reward && earned_minutes >= rates.min_collect_minutes;

    let minute_progress01 =
        ((elapsed_seconds % SECONDS_PER_MINUTE) / SECONDS_PER_MINUTE).clamp(0.0, 1.0);

    AccrualSnapshot {
        elapsed_seconds,
        earned_minutes,
        coin_amount,
        hammer_amount,
        can_collect,
        minute_progress01,
    }
}
