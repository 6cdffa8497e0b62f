use anyhow::{Result, ensure};
use serde::Serialize;
use std::time::{Duration, Instant};

use idlevault_game::{
    CollectError, CollectOutcome, CollectionController, DurableRecord, DurableStore,
    DurationSource, Grant, ManualClock, MemoryStore, RateConfig, RewardConfig, SaveSlot,
    SimulatedController, SimulationConfig, snapshot,
};

const NOW: i64 = 1_750_000_000;

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub passed: bool,
    pub failure: Option<String>,
    pub duration: Duration,
}

struct Scenario {
    name: &'static str,
    check: fn() -> Result<()>,
}

fn catalog() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "Accrual After 125 Seconds",
            check: accrual_after_125_seconds,
        },
        Scenario {
            name: "Accrual Below One Minute",
            check: accrual_below_one_minute,
        },
        Scenario {
            name: "Collect Into Existing Wallet",
            check: collect_into_existing_wallet,
        },
        Scenario {
            name: "Future Anchor Clamps To Zero",
            check: future_anchor_clamps_to_zero,
        },
        Scenario {
            name: "Idempotent Collect",
            check: idempotent_collect,
        },
        Scenario {
            name: "Corrupt Save Recovery",
            check: corrupt_save_recovery,
        },
        Scenario {
            name: "Save Round Trip",
            check: save_round_trip,
        },
        Scenario {
            name: "Simulated Speed Control",
            check: simulated_speed_control,
        },
        Scenario {
            name: "Interrupted Session Cannot Regrant",
            check: interrupted_session_cannot_regrant,
        },
        Scenario {
            name: "Unsaved Collect Reported",
            check: unsaved_collect_reported,
        },
    ]
}

pub fn run_catalog() -> Vec<ScenarioResult> {
    catalog()
        .into_iter()
        .map(|scenario| {
            let start = Instant::now();
            let outcome = (scenario.check)();
            let duration = start.elapsed();
            ScenarioResult {
                scenario_name: scenario.name.to_string(),
                passed: outcome.is_ok(),
                failure: outcome.err().map(|e| format!("{e:#}")),
                duration,
            }
        })
        .collect()
}

fn case_rates() -> RateConfig {
    RateConfig {
        coin_per_minute: 10,
        hammer_per_minute: 1,
        min_collect_minutes: 1,
    }
}

fn seeded_store(anchor: i64, coins: i64, hammers: i64) -> Result<MemoryStore> {
    let store = MemoryStore::new();
    store.save(&DurableRecord {
        last_collect_utc_seconds: anchor,
        coins,
        hammers,
    })?;
    Ok(store)
}

fn accrual_after_125_seconds() -> Result<()> {
    let snap = snapshot(125.0, &case_rates());
    ensure!(snap.earned_minutes == 2, "earned {} minutes", snap.earned_minutes);
    ensure!(snap.coin_amount == 20, "coins {}", snap.coin_amount);
    ensure!(snap.hammer_amount == 2, "hammers {}", snap.hammer_amount);
    ensure!(snap.can_collect, "collect should be enabled");
    ensure!(
        (snap.minute_progress01 - 5.0 / 60.0).abs() < 1e-9,
        "progress {}",
        snap.minute_progress01
    );
    Ok(())
}

fn accrual_below_one_minute() -> Result<()> {
    let snap = snapshot(45.0, &case_rates());
    ensure!(snap.earned_minutes == 0, "earned {} minutes", snap.earned_minutes);
    ensure!(
        snap.coin_amount == 0 && snap.hammer_amount == 0,
        "amounts should be zero"
    );
    ensure!(!snap.can_collect, "collect should be locked");
    Ok(())
}

fn collect_into_existing_wallet() -> Result<()> {
    let store = seeded_store(NOW - 125, 5, 0)?;
    let mut controller =
        CollectionController::realtime(case_rates(), store.clone(), ManualClock::new(NOW));
    let granted = controller.collect()?.granted();
    ensure!(
        granted
            == Grant {
                coins: 20,
                hammers: 2
            },
        "granted {granted:?}"
    );
    let balances = controller.balances();
    ensure!(
        balances.coins == 25 && balances.hammers == 2,
        "wallet {balances}"
    );
    ensure!(
        controller.duration().elapsed_seconds() == 0.0,
        "timer not reset"
    );
    let on_disk = store.load(0);
    ensure!(
        on_disk.last_collect_utc_seconds == NOW,
        "anchor {} not re-persisted",
        on_disk.last_collect_utc_seconds
    );
    Ok(())
}

fn future_anchor_clamps_to_zero() -> Result<()> {
    let store = seeded_store(NOW + 100, 0, 0)?;
    let controller = CollectionController::realtime(case_rates(), store, ManualClock::new(NOW));
    let elapsed = controller.duration().elapsed_seconds();
    ensure!(elapsed == 0.0, "elapsed {elapsed}");
    Ok(())
}

fn idempotent_collect() -> Result<()> {
    let store = seeded_store(NOW - 600, 0, 0)?;
    let mut controller = CollectionController::realtime(case_rates(), store, ManualClock::new(NOW));
    let first = controller.collect()?;
    let second = controller.collect()?;
    ensure!(
        matches!(first, CollectOutcome::Granted(_)),
        "first collect {first:?}"
    );
    ensure!(second == CollectOutcome::Rejected, "second collect {second:?}");
    ensure!(
        controller.balances().coins == 100,
        "wallet {}",
        controller.balances()
    );
    Ok(())
}

fn corrupt_save_recovery() -> Result<()> {
    for raw in ["", "{", "[]", "{\"coins\": \"many\"}"] {
        let record = MemoryStore::with_contents(raw).load(NOW);
        ensure!(
            record == DurableRecord::fresh(NOW),
            "input {raw:?} gave {record:?}"
        );
    }
    let slot = SaveSlot::open(MemoryStore::with_contents("garbage"), NOW);
    ensure!(!slot.is_dirty(), "repaired record should be written back");
    Ok(())
}

fn save_round_trip() -> Result<()> {
    let store = seeded_store(NOW - 1, 17, 4)?;
    let loaded = store.load(NOW);
    store.save(&loaded)?;
    let reloaded = store.load(NOW + 500);
    ensure!(loaded == reloaded, "{loaded:?} != {reloaded:?}");
    Ok(())
}

fn simulated_speed_control() -> Result<()> {
    let cfg = RewardConfig {
        simulation: SimulationConfig {
            start_seconds: 0.0,
            ..SimulationConfig::default()
        },
        ..RewardConfig::default()
    };
    let mut controller = SimulatedController::simulated(&cfg);
    for _ in 0..8 {
        controller.duration_mut().increase_speed();
    }
    let speed = controller.duration().speed();
    ensure!(speed == cfg.simulation.max_speed, "speed {speed} not clamped");
    controller.tick(2.0);
    let snap = controller.snapshot();
    ensure!(snap.earned_minutes == 1, "earned {}", snap.earned_minutes);
    ensure!(
        !controller.ledger().is_persistent(),
        "simulation must not persist"
    );
    Ok(())
}

fn interrupted_session_cannot_regrant() -> Result<()> {
    let store = seeded_store(NOW - 600, 0, 0)?;
    store.fail_writes_after(2);
    let mut controller =
        CollectionController::realtime(case_rates(), store.clone(), ManualClock::new(NOW));
    let granted = controller.collect()?.granted();
    ensure!(granted.coins == 100, "granted {granted:?}");
    drop(controller);

    let mut restarted =
        CollectionController::realtime(case_rates(), store, ManualClock::new(NOW));
    let again = restarted.collect()?;
    ensure!(again == CollectOutcome::Rejected, "regranted after restart: {again:?}");
    ensure!(
        restarted.balances().coins == 100,
        "wallet {}",
        restarted.balances()
    );
    Ok(())
}

fn unsaved_collect_reported() -> Result<()> {
    let store = seeded_store(NOW - 300, 0, 0)?;
    let mut controller =
        CollectionController::realtime(case_rates(), store.clone(), ManualClock::new(NOW));
    store.set_fail_writes(true);
    match controller.collect() {
        Err(CollectError::Unsaved { grant, .. }) => {
            ensure!(grant.coins == 50, "grant {grant:?}");
        }
        other => anyhow::bail!("expected unsaved error, got {other:?}"),
    }
    ensure!(
        controller.collect()? == CollectOutcome::Rejected,
        "collect repeated after failed save"
    );
    Ok(())
}
