//! Offline-duration sources.
//!
//! The reward logic only ever asks "how long since the last collection?" and
//! "start counting again". [`SimulatedDuration`] answers from a speed-scaled
//! frame counter; [`RealtimeDuration`] answers from the wall clock and the
//! persisted anchor timestamp.

use crate::clock::WallClock;
use crate::config::SimulationConfig;
use crate::constants::LOG_TARGET_DURATION;
use crate::numbers::{i64_to_f64, non_negative_seconds};
use crate::store::{DurableRecord, DurableStore, SaveSlot, StoreError};

/// Capability interface over the elapsed-time variants.
pub trait DurationSource {
    /// Seconds accrued since the last reset. Always `>= 0`.
    fn elapsed_seconds(&self) -> f64;

    /// Zero the accrued time.
    ///
    /// # Errors
    ///
    /// Returns an error if a new anchor cannot be persisted. Elapsed time is
    /// zeroed in memory regardless.
    fn reset(&mut self) -> Result<(), StoreError>;

    /// Zero the accrued time as part of a record edit that the caller
    /// persists in one write. Sources without a persisted anchor leave
    /// `record` untouched.
    fn reset_into(&mut self, record: &mut DurableRecord);

    /// Per-frame tick with the host's frame delta in seconds.
    fn advance(&mut self, frame_delta: f64);

    /// Host lifecycle hook (focus regained, resumed from pause).
    fn refresh(&mut self) {}
}

/// Clamp bounds and step for the debug speed control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedControl {
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

impl SpeedControl {
    #[must_use]
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            step: cfg.speed_step,
            min: cfg.min_speed,
            max: cfg.max_speed,
        }
    }

    /// Clamp `speed` into `[min, max]`. Non-finite input falls back to `min`.
    #[must_use]
    pub fn clamp(&self, speed: f64) -> f64 {
        if speed.is_finite() {
            speed.clamp(self.min, self.max)
        } else {
            self.min
        }
    }

    #[must_use]
    pub fn increased(&self, speed: f64) -> f64 {
        self.clamp(speed * self.step)
    }

    #[must_use]
    pub fn decreased(&self, speed: f64) -> f64 {
        self.clamp(speed / self.step)
    }
}

/// Development clock that simulates offline time under program control.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedDuration {
    elapsed: f64,
    speed: f64,
    control: SpeedControl,
}

impl SimulatedDuration {
    #[must_use]
    pub fn new(cfg: &SimulationConfig) -> Self {
        let control = SpeedControl::from_config(cfg);
        Self {
            elapsed: non_negative_seconds(cfg.start_seconds),
            speed: control.clamp(cfg.speed_multiplier),
            control,
        }
    }

    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    #[must_use]
    pub const fn control(&self) -> SpeedControl {
        self.control
    }

    /// Set the speed multiplier, clamped to the control range. Returns the
    /// value actually applied.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.speed = self.control.clamp(speed);
        log::debug!(target: LOG_TARGET_DURATION, "simulation speed set to {}", self.speed);
        self.speed
    }

    pub fn increase_speed(&mut self) -> f64 {
        self.set_speed(self.control.increased(self.speed))
    }

    pub fn decrease_speed(&mut self) -> f64 {
        self.set_speed(self.control.decreased(self.speed))
    }
}

impl DurationSource for SimulatedDuration {
    fn elapsed_seconds(&self) -> f64 {
        self.elapsed
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        self.elapsed = 0.0;
        Ok(())
    }

    fn reset_into(&mut self, _record: &mut DurableRecord) {
        self.elapsed = 0.0;
    }

    fn advance(&mut self, frame_delta: f64) {
        self.elapsed = non_negative_seconds(self.elapsed + frame_delta * self.speed);
    }
}

/// Wall-clock duration anchored to the persisted last-collect timestamp.
#[derive(Debug)]
pub struct RealtimeDuration<S: DurableStore, C: WallClock> {
    slot: SaveSlot<S>,
    clock: C,
}

impl<S: DurableStore, C: WallClock> RealtimeDuration<S, C> {
    #[must_use]
    pub const fn new(slot: SaveSlot<S>, clock: C) -> Self {
        Self { slot, clock }
    }

    /// Persisted anchor timestamp (seconds since the Unix epoch).
    #[must_use]
    pub fn anchor_epoch_seconds(&self) -> i64 {
        self.slot.record().last_collect_utc_seconds
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}

impl<S: DurableStore, C: WallClock> DurationSource for RealtimeDuration<S, C> {
    fn elapsed_seconds(&self) -> f64 {
        // A future-dated anchor (clock skew) reads as zero, never negative.
        let diff = self
            .clock
            .now_epoch_seconds()
            .saturating_sub(self.anchor_epoch_seconds());
        i64_to_f64(diff.max(0))
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        let now = self.clock.now_epoch_seconds();
        log::debug!(target: LOG_TARGET_DURATION, "re-anchoring offline timer at {now}");
        self.slot.update(|record| record.last_collect_utc_seconds = now)
    }

    // Runs inside the shared slot's update, so it must not read the slot.
    fn reset_into(&mut self, record: &mut DurableRecord) {
        let now = self.clock.now_epoch_seconds();
        log::debug!(target: LOG_TARGET_DURATION, "re-anchoring offline timer at {now}");
        record.last_collect_utc_seconds = now;
    }

    fn advance(&mut self, _frame_delta: f64) {}

    fn refresh(&mut self) {
        log::debug!(
            target: LOG_TARGET_DURATION,
            "recomputed offline duration: {}s",
            self.elapsed_seconds()
        );
    }
}
