//! idlevault reward engine
//!
//! Platform-agnostic offline-reward logic: resources accrue while the player
//! is away and can be collected once per accrual period. This crate provides
//! the time sources, reward math, wallet and persistence without any UI or
//! platform-specific dependencies. Hosts render [`RewardView`] and forward
//! the `Collect`/`Loot` commands and lifecycle events.

pub mod accrual;
pub mod clock;
pub mod collection;
pub mod config;
pub mod constants;
pub mod duration;
pub mod ledger;
pub mod numbers;
pub mod store;
pub mod view;

// Re-export commonly used types
pub use accrual::{AccrualSnapshot, snapshot};
pub use clock::{ManualClock, SystemClock, WallClock};
pub use collection::{
    CollectError, CollectOutcome, CollectState, CollectionController, SimulatedController,
};
pub use config::{ConfigError, RateConfig, RewardConfig, SaveConfig, SimulationConfig};
pub use duration::{DurationSource, RealtimeDuration, SimulatedDuration, SpeedControl};
pub use ledger::{Balances, EphemeralLedger, Grant, Ledger, Resource};
pub use store::{DurableRecord, DurableStore, FileStore, MemoryStore, SaveSlot, StoreError};
pub use view::{RewardView, format_duration, format_rate, format_speed};

/// Real-clock controller persisting to a JSON file.
pub type FileController<C = SystemClock> = CollectionController<RealtimeDuration<FileStore, C>, FileStore>;

/// Open the real-clock reward session stored beneath `base_dir`.
#[must_use]
pub fn open_file_session(cfg: &RewardConfig, base_dir: &std::path::Path) -> FileController {
    let store = FileStore::new(cfg.save.path(base_dir));
    CollectionController::realtime(cfg.rates, store, SystemClock)
}
