//! Presentation-facing values.
//!
//! The popup UI is an external collaborator; it only receives the values
//! computed here and never reaches back into reward logic.

use serde::Serialize;

use crate::accrual::AccrualSnapshot;
use crate::config::RateConfig;
use crate::numbers::{floor_f64_to_i64, non_negative_seconds};

/// Everything the popup renders for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardView {
    pub coin_rate: String,
    pub hammer_rate: String,
    pub duration: String,
    pub coin_amount: i64,
    pub hammer_amount: i64,
    pub coin_progress01: f64,
    pub hammer_progress01: f64,
    pub collect_enabled: bool,
}

impl RewardView {
    #[must_use]
    pub fn new(snapshot: &AccrualSnapshot, rates: &RateConfig) -> Self {
        Self {
            coin_rate: format_rate(rates.coin_per_minute),
            hammer_rate: format_rate(rates.hammer_per_minute),
            duration: format_duration(snapshot.elapsed_seconds),
            coin_amount: snapshot.coin_amount,
            hammer_amount: snapshot.hammer_amount,
            coin_progress01: snapshot.minute_progress01,
            hammer_progress01: snapshot.minute_progress01,
            collect_enabled: snapshot.can_collect,
        }
    }
}

/// `Xh Ym Zs` from one hour, `Ym Zs` from one minute, else `Zs`. Fractions
/// are truncated and negative input reads as zero.
#[must_use]
pub fn format_duration(total_seconds: f64) -> String {
    let seconds = floor_f64_to_i64(non_negative_seconds(total_seconds));
    let minutes = seconds / 60;
    let sec = seconds % 60;
    let hours = minutes / 60;
    let min = minutes % 60;

    if hours > 0 {
        format!("{hours}h {min}m {sec}s")
    } else if minutes > 0 {
        format!("{min}m {sec}s")
    } else {
        format!("{sec}s")
    }
}

#[must_use]
pub fn format_rate(per_minute: i64) -> String {
    format!("{per_minute}/m")
}

/// Speed multiplier with at most two decimals and no trailing zeros.
#[must_use]
pub fn format_speed(speed: f64) -> String {
    let fixed = format!("{speed:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}x")
}
