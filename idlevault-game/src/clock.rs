//! Wall-clock sources used by the real-time duration variant.
use chrono::Utc;
use std::cell::Cell;
use std::rc::Rc;

/// Trait for abstracting the current UTC time.
/// Hosts use [`SystemClock`]; tests and scenarios inject a [`ManualClock`].
pub trait WallClock {
    /// Current time as whole seconds since the Unix epoch.
    fn now_epoch_seconds(&self) -> i64;
}

/// System UTC clock backed by chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_epoch_seconds(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Settable clock. Clones share the same underlying instant, so a test can
/// keep one handle while the duration source owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_epoch_seconds: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_epoch_seconds)),
        }
    }

    pub fn set(&self, epoch_seconds: i64) {
        self.now.set(epoch_seconds);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.set(self.now.get().saturating_add(seconds));
    }
}

impl WallClock for ManualClock {
    fn now_epoch_seconds(&self) -> i64 {
        self.now.get()
    }
}

impl<C: WallClock + ?Sized> WallClock for &C {
    fn now_epoch_seconds(&self) -> i64 {
        (**self).now_epoch_seconds()
    }
}
