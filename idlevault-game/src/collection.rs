//! Collect orchestration.
//!
//! The controller reads the duration source, derives a fresh snapshot, and
//! on `collect` credits the ledger, restarts the duration source and notifies
//! a single listener. It has two observable states: `Idle` while the gate is
//! closed and `Collectible` once it opens.

use serde::Serialize;
use thiserror::Error;

use crate::accrual::{AccrualSnapshot, snapshot};
use crate::clock::WallClock;
use crate::config::{RateConfig, RewardConfig};
use crate::constants::LOG_TARGET_COLLECT;
use crate::duration::{DurationSource, RealtimeDuration, SimulatedDuration};
use crate::ledger::{Balances, Grant, Ledger};
use crate::store::{DurableStore, MemoryStore, SaveSlot, StoreError};
use crate::view::RewardView;

/// Whether a collection is currently allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectState {
    Idle,
    Collectible,
}

/// Result of a `Collect` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectOutcome {
    Granted(Grant),
    /// Gate closed; nothing was mutated.
    Rejected,
}

impl CollectOutcome {
    /// Granted amounts, zero when rejected.
    #[must_use]
    pub const fn granted(&self) -> Grant {
        match self {
            Self::Granted(grant) => *grant,
            Self::Rejected => Grant {
                coins: 0,
                hammers: 0,
            },
        }
    }
}

/// A collection that was applied in memory but could not be saved.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("unable to save progress after collecting {} coins and {} hammers", grant.coins, grant.hammers)]
    Unsaved {
        grant: Grant,
        #[source]
        source: StoreError,
    },
}

type CollectListener = Box<dyn FnMut(Grant)>;

/// Reward controller over any duration source and store.
pub struct CollectionController<D, S>
where
    D: DurationSource,
    S: DurableStore,
{
    rates: RateConfig,
    duration: D,
    ledger: Ledger<S>,
    listener: Option<CollectListener>,
    last_rendered_second: Option<i64>,
}

/// Controller driven by the development clock with an ephemeral ledger.
pub type SimulatedController = CollectionController<SimulatedDuration, MemoryStore>;

impl SimulatedController {
    /// Simulation session: accrual starts at the configured offset, the
    /// wallet starts empty and nothing is written to storage.
    #[must_use]
    pub fn simulated(cfg: &RewardConfig) -> Self {
        Self::new(
            cfg.rates,
            SimulatedDuration::new(&cfg.simulation),
            Ledger::ephemeral(),
        )
    }
}

impl<S, C> CollectionController<RealtimeDuration<S, C>, S>
where
    S: DurableStore,
    C: WallClock,
{
    /// Real-clock session: the store is loaded once, authoritatively, and
    /// shared by the ledger and the anchor timestamp.
    pub fn realtime(rates: RateConfig, store: S, clock: C) -> Self {
        let slot = SaveSlot::open(store, clock.now_epoch_seconds());
        let ledger = Ledger::persistent(slot.clone());
        Self::new(rates, RealtimeDuration::new(slot, clock), ledger)
    }
}

impl<D, S> CollectionController<D, S>
where
    D: DurationSource,
    S: DurableStore,
{
    #[must_use]
    pub const fn new(rates: RateConfig, duration: D, ledger: Ledger<S>) -> Self {
        Self {
            rates,
            duration,
            ledger,
            listener: None,
            last_rendered_second: None,
        }
    }

    /// Install the single consumer notified after each successful collect.
    #[must_use]
    pub fn with_listener(mut self, listener: impl FnMut(Grant) + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    #[must_use]
    pub const fn rates(&self) -> &RateConfig {
        &self.rates
    }

    #[must_use]
    pub const fn duration(&self) -> &D {
        &self.duration
    }

    pub const fn duration_mut(&mut self) -> &mut D {
        &mut self.duration
    }

    #[must_use]
    pub const fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    #[must_use]
    pub const fn balances(&self) -> Balances {
        self.ledger.balances()
    }

    /// Fresh snapshot of the current elapsed time.
    #[must_use]
    pub fn snapshot(&self) -> AccrualSnapshot {
        snapshot(self.duration.elapsed_seconds(), &self.rates)
    }

    #[must_use]
    pub fn state(&self) -> CollectState {
        if self.snapshot().can_collect {
            CollectState::Collectible
        } else {
            CollectState::Idle
        }
    }

    #[must_use]
    pub fn view(&self) -> RewardView {
        RewardView::new(&self.snapshot(), &self.rates)
    }

    /// Advance one host frame. Returns a new view only when the whole-second
    /// reading changed since the last rendered one.
    pub fn tick(&mut self, frame_delta: f64) -> Option<RewardView> {
        self.duration.advance(frame_delta);
        self.render_if_changed()
    }

    /// Host regained focus. Real-clock sources recompute immediately.
    pub fn on_application_focus(&mut self, has_focus: bool) -> Option<RewardView> {
        if !has_focus {
            return None;
        }
        self.force_refresh()
    }

    /// Host paused or resumed. Real-clock sources recompute on resume.
    pub fn on_application_pause(&mut self, paused: bool) -> Option<RewardView> {
        if paused {
            return None;
        }
        self.force_refresh()
    }

    /// Restart accrual without granting anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a new anchor cannot be persisted.
    pub fn reset_timer(&mut self) -> Result<(), StoreError> {
        self.last_rendered_second = None;
        self.duration.reset()
    }

    /// `Collect` command.
    ///
    /// Rejected (no mutation, no event) unless the current snapshot passes
    /// the gate. Otherwise both amounts are credited, the duration source
    /// restarts, and the listener is notified. The new balances and the new
    /// anchor reach storage in the same write.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Unsaved`] if persisting failed. The collection
    /// has still been applied in memory, so collecting again is rejected
    /// until new time accrues; the caller may retry with
    /// [`Self::retry_save`].
    pub fn collect(&mut self) -> Result<CollectOutcome, CollectError> {
        let snap = self.snapshot();
        if !snap.can_collect {
            log::debug!(
                target: LOG_TARGET_COLLECT,
                "collect rejected: {} earned minute(s), gate {}",
                snap.earned_minutes,
                self.rates.min_collect_minutes
            );
            return Ok(CollectOutcome::Rejected);
        }

        let grant = snap.grant();
        let duration = &mut self.duration;
        let saved = self
            .ledger
            .credit_grant_with(grant, |record| duration.reset_into(record));
        self.last_rendered_second = None;

        log::info!(
            target: LOG_TARGET_COLLECT,
            "collected {} coins and {} hammers after {}s (wallet {})",
            grant.coins,
            grant.hammers,
            snap.whole_seconds(),
            self.ledger.balances()
        );
        if let Some(listener) = self.listener.as_mut() {
            listener(grant);
        }

        saved
            .map(|()| CollectOutcome::Granted(grant))
            .map_err(|source| CollectError::Unsaved { grant, source })
    }

    /// `Loot` command. Reserved for a future feature; never mutates state.
    pub fn loot(&self) {
        log::debug!(target: LOG_TARGET_COLLECT, "loot is a placeholder");
    }

    /// Retry persisting the ledger's record after an earlier failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the save fails again.
    pub fn retry_save(&self) -> Result<(), StoreError> {
        self.ledger.save_slot().map_or(Ok(()), SaveSlot::flush)
    }

    fn force_refresh(&mut self) -> Option<RewardView> {
        self.duration.refresh();
        self.last_rendered_second = None;
        self.render_if_changed()
    }

    fn render_if_changed(&mut self) -> Option<RewardView> {
        let snap = self.snapshot();
        let second = snap.whole_seconds();
        if self.last_rendered_second == Some(second) {
            return None;
        }
        self.last_rendered_second = Some(second);
        Some(RewardView::new(&snap, &self.rates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SimulationConfig;
    use crate::store::DurableRecord;
    use std::cell::RefCell;
    use std::rc::Rc;

    const NOW: i64 = 1_700_000_000;

    fn sim_controller(start_seconds: f64) -> SimulatedController {
        SimulatedController::simulated(&RewardConfig {
            simulation: SimulationConfig {
                start_seconds,
                ..SimulationConfig::default()
            },
            ..RewardConfig::default()
        })
    }

    #[test]
    fn collect_grants_once_then_rejects() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let mut controller =
            sim_controller(125.0).with_listener(move |grant| sink.borrow_mut().push(grant));

        assert_eq!(controller.state(), CollectState::Collectible);
        let first = controller.collect().unwrap();
        assert_eq!(first, CollectOutcome::Granted(Grant {
            coins: 20,
            hammers: 2
        }));
        assert_eq!(controller.state(), CollectState::Idle);

        let second = controller.collect().unwrap();
        assert_eq!(second, CollectOutcome::Rejected);
        assert_eq!(second.granted(), Grant::default());
        assert_eq!(controller.balances(), Balances {
            coins: 20,
            hammers: 2
        });
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn rejected_collect_mutates_nothing() {
        let fired = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&fired);
        let mut controller = sim_controller(45.0).with_listener(move |_| *sink.borrow_mut() += 1);
        assert_eq!(controller.collect().unwrap(), CollectOutcome::Rejected);
        assert!((controller.duration().elapsed_seconds() - 45.0).abs() < f64::EPSILON);
        assert_eq!(controller.balances(), Balances::default());
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn tick_renders_only_on_whole_second_changes() {
        let mut controller = sim_controller(0.0);
        assert!(controller.tick(0.25).is_some());
        assert!(controller.tick(0.25).is_none());
        assert!(controller.tick(0.25).is_none());
        let view = controller.tick(0.25).unwrap();
        assert_eq!(view.duration, "1s");
        assert!(!view.collect_enabled);
    }

    #[test]
    fn tick_reaches_gate_at_one_minute() {
        let mut controller = sim_controller(0.0);
        controller.duration_mut().set_speed(4.0);
        let mut last = None;
        for _ in 0..15 {
            if let Some(view) = controller.tick(1.0) {
                last = Some(view);
            }
        }
        let view = last.unwrap();
        assert_eq!(view.duration, "1m 0s");
        assert!(view.collect_enabled);
        assert_eq!(controller.state(), CollectState::Collectible);
    }

    #[test]
    fn realtime_collect_updates_ledger_and_anchor() {
        let store = MemoryStore::new();
        store
            .save(&DurableRecord {
                last_collect_utc_seconds: NOW - 125,
                coins: 5,
                hammers: 0,
            })
            .unwrap();
        let clock = ManualClock::new(NOW);
        let mut controller =
            CollectionController::realtime(RateConfig::default(), store.clone(), clock.clone());

        let outcome = controller.collect().unwrap();
        assert_eq!(outcome.granted(), Grant {
            coins: 20,
            hammers: 2
        });
        assert_eq!(controller.balances(), Balances {
            coins: 25,
            hammers: 2
        });
        assert!(controller.duration().elapsed_seconds().abs() < f64::EPSILON);
        assert_eq!(store.load(0), DurableRecord {
            last_collect_utc_seconds: NOW,
            coins: 25,
            hammers: 2,
        });
    }

    #[test]
    fn unsaved_collect_is_reported_and_not_repeated() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(NOW);
        let mut controller =
            CollectionController::realtime(RateConfig::default(), store.clone(), clock.clone());
        clock.advance(600);
        store.set_fail_writes(true);

        let err = controller.collect().unwrap_err();
        let CollectError::Unsaved { grant, .. } = &err;
        assert_eq!(*grant, Grant {
            coins: 100,
            hammers: 10
        });
        assert!(err.to_string().starts_with("unable to save progress"));
        assert_eq!(controller.balances().coins, 100);
        assert_eq!(controller.collect().unwrap(), CollectOutcome::Rejected);

        store.set_fail_writes(false);
        controller.retry_save().unwrap();
        assert_eq!(store.load(0).coins, 100);
        assert_eq!(store.load(0).last_collect_utc_seconds, NOW + 600);
    }

    #[test]
    fn collect_writes_balances_and_anchor_together() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(NOW);
        let mut controller =
            CollectionController::realtime(RateConfig::default(), store.clone(), clock.clone());
        clock.advance(600);
        let writes = store.write_count();

        controller.collect().unwrap();
        assert_eq!(store.write_count(), writes + 1);
        assert_eq!(store.load(0), DurableRecord {
            last_collect_utc_seconds: NOW + 600,
            coins: 100,
            hammers: 10,
        });
    }

    #[test]
    fn interrupted_session_cannot_collect_the_same_minutes_twice() {
        let store = MemoryStore::new();
        store
            .save(&DurableRecord {
                last_collect_utc_seconds: NOW - 600,
                coins: 0,
                hammers: 0,
            })
            .unwrap();
        // Initial write-back and the collect succeed; the process dies after.
        store.fail_writes_after(2);
        let mut controller =
            CollectionController::realtime(RateConfig::default(), store.clone(), ManualClock::new(NOW));
        assert_eq!(controller.collect().unwrap().granted(), Grant {
            coins: 100,
            hammers: 10
        });
        drop(controller);

        let mut restarted =
            CollectionController::realtime(RateConfig::default(), store.clone(), ManualClock::new(NOW));
        assert_eq!(restarted.collect().unwrap(), CollectOutcome::Rejected);
        assert_eq!(restarted.balances(), Balances {
            coins: 100,
            hammers: 10
        });
    }

    #[test]
    fn failed_collect_write_leaves_previous_record_on_disk() {
        let store = MemoryStore::new();
        store
            .save(&DurableRecord {
                last_collect_utc_seconds: NOW - 600,
                coins: 7,
                hammers: 1,
            })
            .unwrap();
        store.fail_writes_after(1);
        let mut controller =
            CollectionController::realtime(RateConfig::default(), store.clone(), ManualClock::new(NOW));
        assert!(controller.collect().is_err());
        assert_eq!(store.load(0), DurableRecord {
            last_collect_utc_seconds: NOW - 600,
            coins: 7,
            hammers: 1,
        });

        let mut restarted =
            CollectionController::realtime(RateConfig::default(), store.clone(), ManualClock::new(NOW));
        let CollectError::Unsaved { grant, .. } = restarted.collect().unwrap_err();
        assert_eq!(grant, Grant {
            coins: 100,
            hammers: 10
        });
        assert_eq!(restarted.balances(), Balances {
            coins: 107,
            hammers: 11
        });
    }

    #[test]
    fn lifecycle_hooks_refresh_on_regain_only() {
        let clock = ManualClock::new(NOW);
        let mut controller =
            CollectionController::realtime(RateConfig::default(), MemoryStore::new(), clock.clone());
        clock.advance(61);
        assert!(controller.on_application_focus(false).is_none());
        assert!(controller.on_application_pause(true).is_none());
        let view = controller.on_application_focus(true).unwrap();
        assert_eq!(view.duration, "1m 1s");
        let view = controller.on_application_pause(false).unwrap();
        assert!(view.collect_enabled);
    }

    #[test]
    fn loot_and_reset_timer() {
        let mut controller = sim_controller(300.0);
        controller.loot();
        assert!((controller.duration().elapsed_seconds() - 300.0).abs() < f64::EPSILON);
        assert_eq!(controller.balances(), Balances::default());

        controller.reset_timer().unwrap();
        assert_eq!(controller.state(), CollectState::Idle);
    }
}
