//! Durable record persistence.
//!
//! The persisted record is tiny (anchor timestamp plus two balances) and is
//! rewritten after every credit and every collection reset. Reads never fail:
//! a missing or unreadable file yields a fresh record. Writes go through a
//! temporary sibling file that is renamed over the target, so a crash
//! mid-write leaves the previous record intact.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::constants::{LOG_TARGET_STORE, TEMP_SAVE_EXTENSION};

/// Persisted offline-reward state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord {
    /// Anchor timestamp of the last collection, seconds since the Unix epoch.
    #[serde(default)]
    pub last_collect_utc_seconds: i64,
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub hammers: i64,
}

impl DurableRecord {
    /// Record created on first run: anchored at `now`, empty balances.
    #[must_use]
    pub const fn fresh(now_epoch_seconds: i64) -> Self {
        Self {
            last_collect_utc_seconds: now_epoch_seconds,
            coins: 0,
            hammers: 0,
        }
    }

    /// Repair a freshly parsed record: a non-positive anchor is treated as
    /// absent and replaced by `now`, negative balances are clamped to zero.
    #[must_use]
    pub fn normalized(self, now_epoch_seconds: i64) -> Self {
        if self.coins < 0 || self.hammers < 0 {
            log::warn!(
                target: LOG_TARGET_STORE,
                "clamping negative balances (coins {}, hammers {}) to zero",
                self.coins,
                self.hammers
            );
        }
        Self {
            last_collect_utc_seconds: if self.last_collect_utc_seconds <= 0 {
                now_epoch_seconds
            } else {
                self.last_collect_utc_seconds
            },
            coins: self.coins.max(0),
            hammers: self.hammers.max(0),
        }
    }

    /// Parse a persisted record.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object of the record shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize deterministically (pretty JSON, fixed field order).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse `raw` and normalize it, substituting a fresh record when the
    /// text is absent or malformed.
    #[must_use]
    pub fn recover(raw: Option<&str>, now_epoch_seconds: i64) -> Self {
        let Some(raw) = raw else {
            return Self::fresh(now_epoch_seconds);
        };
        match Self::from_json(raw) {
            Ok(record) => record.normalized(now_epoch_seconds),
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET_STORE,
                    "discarding unreadable save record ({err}); starting fresh"
                );
                Self::fresh(now_epoch_seconds)
            }
        }
    }
}

/// Failure to persist a record. The message is deliberately user-facing;
/// the underlying fault stays reachable through `source()`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to save progress to {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to save progress: record could not be encoded")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Trait for abstracting record persistence.
/// The host provides [`FileStore`]; tests substitute [`MemoryStore`].
pub trait DurableStore {
    /// Read the backing record. Missing, unreadable or malformed data yields
    /// `DurableRecord::fresh(now)`; this never fails.
    fn load(&self, now_epoch_seconds: i64) -> DurableRecord;

    /// Overwrite the backing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written durably.
    fn save(&self, record: &DurableRecord) -> Result<(), StoreError>;
}

/// JSON file store with atomic replace-on-write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".");
        name.push(TEMP_SAVE_EXTENSION);
        self.path.with_file_name(name)
    }
}

impl DurableStore for FileStore {
    fn load(&self, now_epoch_seconds: i64) -> DurableRecord {
        match fs::read_to_string(&self.path) {
            Ok(raw) => DurableRecord::recover(Some(&raw), now_epoch_seconds),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!(
                    target: LOG_TARGET_STORE,
                    "no save file at {}; initializing",
                    self.path.display()
                );
                DurableRecord::fresh(now_epoch_seconds)
            }
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET_STORE,
                    "failed to read {} ({err}); starting fresh",
                    self.path.display()
                );
                DurableRecord::fresh(now_epoch_seconds)
            }
        }
    }

    fn save(&self, record: &DurableRecord) -> Result<(), StoreError> {
        let json = record.to_json()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = self.temp_path();
        {
            let mut file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
            file.write_all(json.as_bytes())
                .and_then(|()| file.sync_all())
                .map_err(|e| StoreError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::io(&self.path, e)
        })
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    contents: RefCell<Option<String>>,
    fail_writes: Cell<bool>,
    write_budget: Cell<Option<usize>>,
    writes: Cell<usize>,
}

/// In-memory store holding the serialized record text. Clones share the same
/// backing slot, and writes can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with raw backing text, which need not be valid.
    #[must_use]
    pub fn with_contents(raw: impl Into<String>) -> Self {
        let store = Self::default();
        store.inner.contents.replace(Some(raw.into()));
        store
    }

    /// Current raw backing text, if anything was ever written.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.inner.contents.borrow().clone()
    }

    /// Make subsequent saves fail (`true`) or succeed again (`false`).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.set(fail);
    }

    /// Allow `remaining` more successful saves, then fail every save after
    /// that, as if the process died mid-session.
    pub fn fail_writes_after(&self, remaining: usize) {
        self.inner.write_budget.set(Some(remaining));
    }

    /// Number of successful saves.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.get()
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, now_epoch_seconds: i64) -> DurableRecord {
        DurableRecord::recover(self.inner.contents.borrow().as_deref(), now_epoch_seconds)
    }

    fn save(&self, record: &DurableRecord) -> Result<(), StoreError> {
        let budget = self.inner.write_budget.get();
        if self.inner.fail_writes.get() || budget == Some(0) {
            return Err(StoreError::io(
                Path::new("<memory>"),
                io::Error::new(io::ErrorKind::StorageFull, "simulated write failure"),
            ));
        }
        let json = record.to_json()?;
        self.inner.contents.replace(Some(json));
        self.inner.writes.set(self.inner.writes.get() + 1);
        if let Some(left) = budget {
            self.inner.write_budget.set(Some(left.saturating_sub(1)));
        }
        Ok(())
    }
}

struct SlotState<S> {
    store: S,
    record: DurableRecord,
    dirty: bool,
}

/// Owned in-memory mirror of the durable record, shared between the ledger
/// and the real-time duration source. Every mutation rewrites the whole
/// record in a single save.
pub struct SaveSlot<S: DurableStore> {
    state: Rc<RefCell<SlotState<S>>>,
}

impl<S: DurableStore> Clone for SaveSlot<S> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<S: DurableStore> std::fmt::Debug for SaveSlot<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SaveSlot")
            .field("record", &state.record)
            .field("dirty", &state.dirty)
            .finish_non_exhaustive()
    }
}

impl<S: DurableStore> SaveSlot<S> {
    /// Authoritative load for this process. The normalized record is written
    /// back immediately so the backing file exists after first run; if that
    /// write fails the slot is left dirty and the next save retries.
    pub fn open(store: S, now_epoch_seconds: i64) -> Self {
        let record = store.load(now_epoch_seconds);
        let dirty = match store.save(&record) {
            Ok(()) => false,
            Err(err) => {
                log::error!(target: LOG_TARGET_STORE, "initial save failed: {err}");
                true
            }
        };
        Self {
            state: Rc::new(RefCell::new(SlotState {
                store,
                record,
                dirty,
            })),
        }
    }

    /// Current in-memory record.
    #[must_use]
    pub fn record(&self) -> DurableRecord {
        self.state.borrow().record
    }

    /// Whether the in-memory record is ahead of the backing store.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    /// Apply `edit` to the in-memory record and persist the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the save fails. The in-memory edit is kept and the
    /// slot is marked dirty.
    pub fn update(&self, edit: impl FnOnce(&mut DurableRecord)) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        edit(&mut state.record);
        Self::persist(&mut state)
    }

    /// Retry persisting the in-memory record.
    ///
    /// # Errors
    ///
    /// Returns an error if the save fails again.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        Self::persist(&mut state)
    }

    /// Re-read the backing store without touching the in-memory record.
    /// Intended for recovery checks and tests only.
    #[must_use]
    pub fn reload_from_store(&self, now_epoch_seconds: i64) -> DurableRecord {
        self.state.borrow().store.load(now_epoch_seconds)
    }

    fn persist(state: &mut SlotState<S>) -> Result<(), StoreError> {
        match state.store.save(&state.record) {
            Ok(()) => {
                state.dirty = false;
                Ok(())
            }
            Err(err) => {
                log::error!(target: LOG_TARGET_STORE, "save failed: {err}");
                state.dirty = true;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn missing_file_yields_fresh_record() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("offline_data.json"));
        assert_eq!(store.load(NOW), DurableRecord::fresh(NOW));
    }

    #[test]
    fn malformed_file_yields_fresh_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("offline_data.json");
        fs::write(&path, "{ \"coins\": 12, \"hammers\": ").unwrap();
        assert_eq!(FileStore::new(&path).load(NOW), DurableRecord::fresh(NOW));

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert_eq!(FileStore::new(&path).load(NOW), DurableRecord::fresh(NOW));

        fs::write(&path, r#"{"coins": "lots"}"#).unwrap();
        assert_eq!(FileStore::new(&path).load(NOW), DurableRecord::fresh(NOW));
    }

    #[test]
    fn load_clamps_negatives_and_repairs_anchor() {
        let store = MemoryStore::with_contents(
            r#"{"lastCollectUtcSeconds": 0, "coins": -5, "hammers": 7}"#,
        );
        let record = store.load(NOW);
        assert_eq!(record.last_collect_utc_seconds, NOW);
        assert_eq!(record.coins, 0);
        assert_eq!(record.hammers, 7);
    }

    #[test]
    fn missing_fields_default_before_normalizing() {
        let store = MemoryStore::with_contents(r#"{"coins": 3}"#);
        let record = store.load(NOW);
        assert_eq!(record, DurableRecord {
            last_collect_utc_seconds: NOW,
            coins: 3,
            hammers: 0,
        });
    }

    #[test]
    fn save_then_load_is_a_fixed_point() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("SaveLoadData").join("offline_data.json"));
        let first = store.load(NOW);
        store.save(&first).unwrap();
        let second = store.load(NOW + 500);
        assert_eq!(first, second);

        let record = DurableRecord {
            last_collect_utc_seconds: NOW - 3_600,
            coins: 25,
            hammers: 2,
        };
        store.save(&record).unwrap();
        assert_eq!(store.load(NOW), record);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn persisted_format_uses_stable_field_names() {
        let record = DurableRecord {
            last_collect_utc_seconds: 42,
            coins: 1,
            hammers: 2,
        };
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["lastCollectUtcSeconds"], 42);
        assert_eq!(object["coins"], 1);
        assert_eq!(object["hammers"], 2);
    }

    #[test]
    fn stale_temp_file_does_not_affect_load() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("offline_data.json"));
        let record = DurableRecord {
            last_collect_utc_seconds: NOW,
            coins: 9,
            hammers: 1,
        };
        store.save(&record).unwrap();
        fs::write(store.temp_path(), "{ torn").unwrap();
        assert_eq!(store.load(NOW + 10), record);
        store.save(&record).unwrap();
        assert_eq!(store.load(NOW + 10), record);
    }

    #[test]
    fn slot_open_writes_back_initialized_record() {
        let store = MemoryStore::new();
        let slot = SaveSlot::open(store.clone(), NOW);
        assert_eq!(store.write_count(), 1);
        assert_eq!(slot.record(), DurableRecord::fresh(NOW));
        assert_eq!(slot.reload_from_store(NOW + 99), DurableRecord::fresh(NOW));
        assert!(!slot.is_dirty());
    }

    #[test]
    fn slot_update_failure_keeps_memory_and_marks_dirty() {
        let store = MemoryStore::new();
        let slot = SaveSlot::open(store.clone(), NOW);
        store.set_fail_writes(true);

        let err = slot.update(|r| r.coins += 10).unwrap_err();
        assert!(err.to_string().starts_with("unable to save progress"));
        assert_eq!(slot.record().coins, 10);
        assert!(slot.is_dirty());
        assert_eq!(slot.reload_from_store(NOW).coins, 0);

        store.set_fail_writes(false);
        slot.flush().unwrap();
        assert!(!slot.is_dirty());
        assert_eq!(slot.reload_from_store(NOW).coins, 10);
    }

    #[test]
    fn slot_open_survives_failed_initial_write() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let slot = SaveSlot::open(store, NOW);
        assert!(slot.is_dirty());
        assert_eq!(slot.record(), DurableRecord::fresh(NOW));
    }
}
