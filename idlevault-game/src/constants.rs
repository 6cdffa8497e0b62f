//! Centralized tuning constants for idlevault reward logic.
//!
//! These are the defaults used when no configuration asset overrides them.
//! Keeping them together means reward pacing only changes through reviewed
//! code or an explicit config file.

// Logging targets ----------------------------------------------------------
pub(crate) const LOG_TARGET_STORE: &str = "idlevault::store";
pub(crate) const LOG_TARGET_LEDGER: &str = "idlevault::ledger";
pub(crate) const LOG_TARGET_DURATION: &str = "idlevault::duration";
pub(crate) const LOG_TARGET_COLLECT: &str = "idlevault::collect";

// Reward rates -------------------------------------------------------------
pub const DEFAULT_COIN_PER_MINUTE: i64 = 10;
pub const DEFAULT_HAMMER_PER_MINUTE: i64 = 1;
pub const DEFAULT_MIN_COLLECT_MINUTES: i64 = 1;

// Accrual ------------------------------------------------------------------
pub const SECONDS_PER_MINUTE: f64 = 60.0;

// Simulated clock ----------------------------------------------------------
/// Pre-accrued time the simulated clock starts with (15 minutes).
pub const DEFAULT_SIM_START_SECONDS: f64 = 15.0 * 60.0;
pub const DEFAULT_SPEED_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_SPEED_STEP: f64 = 2.0;
pub const DEFAULT_MIN_SPEED: f64 = 1.0;
pub const DEFAULT_MAX_SPEED: f64 = 32.0;

// Persistence --------------------------------------------------------------
pub const DEFAULT_SAVE_DIRECTORY: &str = "SaveLoadData";
pub const DEFAULT_SAVE_FILE_NAME: &str = "offline_data.json";
pub(crate) const TEMP_SAVE_EXTENSION: &str = "tmp";
