//! Resource balances.
//!
//! The ledger is the authoritative owner of the player's balances once it has
//! been seeded. Balances only ever grow, and every change is mirrored into
//! the save slot in a single write.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::LOG_TARGET_LEDGER;
use crate::store::{DurableRecord, DurableStore, MemoryStore, SaveSlot, StoreError};

/// Resource kinds accrued while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Coins,
    Hammers,
}

impl Resource {
    pub const ALL: [Self; 2] = [Self::Coins, Self::Hammers];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Coins => "coins",
            Self::Hammers => "hammers",
        }
    }
}

/// Snapshot of the wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub coins: i64,
    pub hammers: i64,
}

impl Balances {
    #[must_use]
    pub const fn get(&self, resource: Resource) -> i64 {
        match resource {
            Resource::Coins => self.coins,
            Resource::Hammers => self.hammers,
        }
    }

    const fn slot_mut(&mut self, resource: Resource) -> &mut i64 {
        match resource {
            Resource::Coins => &mut self.coins,
            Resource::Hammers => &mut self.hammers,
        }
    }
}

impl fmt::Display for Balances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} coins / {} hammers", self.coins, self.hammers)
    }
}

/// Amounts granted by one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub coins: i64,
    pub hammers: i64,
}

impl Grant {
    #[must_use]
    pub const fn get(&self, resource: Resource) -> i64 {
        match resource {
            Resource::Coins => self.coins,
            Resource::Hammers => self.hammers,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.coins <= 0 && self.hammers <= 0
    }
}

/// Wallet with optional persistence. An ephemeral ledger (simulation mode)
/// starts empty and never touches storage.
#[derive(Debug)]
pub struct Ledger<S: DurableStore> {
    balances: Balances,
    slot: Option<SaveSlot<S>>,
}

/// Ledger used by simulated sessions.
pub type EphemeralLedger = Ledger<MemoryStore>;

impl<S: DurableStore> Ledger<S> {
    /// Seed balances from the slot's authoritative record.
    #[must_use]
    pub fn persistent(slot: SaveSlot<S>) -> Self {
        let record = slot.record();
        Self {
            balances: Balances {
                coins: record.coins.max(0),
                hammers: record.hammers.max(0),
            },
            slot: Some(slot),
        }
    }

    #[must_use]
    pub const fn ephemeral() -> Self {
        Self {
            balances: Balances {
                coins: 0,
                hammers: 0,
            },
            slot: None,
        }
    }

    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.slot.is_some()
    }

    #[must_use]
    pub const fn balances(&self) -> Balances {
        self.balances
    }

    /// Save slot mirrored by this ledger, if persistent.
    #[must_use]
    pub const fn save_slot(&self) -> Option<&SaveSlot<S>> {
        self.slot.as_ref()
    }

    /// Add `amount` of `resource`. Non-positive amounts are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated balance cannot be persisted; the
    /// in-memory balance has already changed.
    pub fn credit(&mut self, resource: Resource, amount: i64) -> Result<(), StoreError> {
        if amount <= 0 {
            return Ok(());
        }
        let slot = self.balances.slot_mut(resource);
        *slot = slot.saturating_add(amount);
        log::debug!(
            target: LOG_TARGET_LEDGER,
            "credited {amount} {} (now {})",
            resource.label(),
            self.balances
        );
        self.persist()
    }

    /// Add both amounts of `grant` and persist them together in one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated balances cannot be persisted; the
    /// in-memory balances have already changed.
    pub fn credit_grant(&mut self, grant: Grant) -> Result<(), StoreError> {
        if grant.is_empty() {
            return Ok(());
        }
        self.credit_grant_with(grant, |_| {})
    }

    /// Add `grant` and apply `also` to the same record, persisting both in
    /// one write. `also` runs even for an empty grant; an ephemeral ledger
    /// hands it a scratch record that is never stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the combined record cannot be persisted; the
    /// in-memory changes are kept.
    pub fn credit_grant_with(
        &mut self,
        grant: Grant,
        also: impl FnOnce(&mut DurableRecord),
    ) -> Result<(), StoreError> {
        for resource in Resource::ALL {
            let amount = grant.get(resource);
            if amount > 0 {
                let slot = self.balances.slot_mut(resource);
                *slot = slot.saturating_add(amount);
            }
        }
        log::debug!(target: LOG_TARGET_LEDGER, "credited grant {grant:?} (now {})", self.balances);

        let balances = self.balances;
        let Some(slot) = &self.slot else {
            let mut scratch = DurableRecord {
                last_collect_utc_seconds: 0,
                coins: balances.coins,
                hammers: balances.hammers,
            };
            also(&mut scratch);
            return Ok(());
        };
        slot.update(|record| {
            record.coins = balances.coins;
            record.hammers = balances.hammers;
            also(record);
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(slot) = &self.slot else {
            return Ok(());
        };
        let balances = self.balances;
        slot.update(|record| {
            record.coins = balances.coins;
            record.hammers = balances.hammers;
        })
    }
}
