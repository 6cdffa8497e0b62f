//! Terminal host for the reward core: renders the popup values and forwards
//! `Collect`/`Loot` the way the game UI would.

use anyhow::{Result, ensure};
use chrono::DateTime;
use colored::Colorize;
use std::io::Write;
use std::path::Path;

use idlevault_game::{
    Balances, CollectError, CollectOutcome, RewardConfig, RewardView, SimulatedController,
    format_speed, open_file_session,
};

/// Upper bound on host frames a single `simulate` run may step through.
pub const MAX_SIMULATED_FRAMES: u64 = 1_000_000;

pub struct SimulateOptions {
    pub seconds: f64,
    pub frame_delta: f64,
    pub speed: Option<f64>,
    pub collect: bool,
    pub verbose: bool,
}

pub fn write_view(out: &mut impl Write, view: &RewardView, balances: Balances) -> Result<()> {
    writeln!(out, "Offline for: {}", view.duration.bold())?;
    writeln!(
        out,
        "  Coins:   {:>6}  ({})  progress {:>3.0}%",
        view.coin_amount,
        view.coin_rate,
        view.coin_progress01 * 100.0
    )?;
    writeln!(
        out,
        "  Hammers: {:>6}  ({})  progress {:>3.0}%",
        view.hammer_amount,
        view.hammer_rate,
        view.hammer_progress01 * 100.0
    )?;
    let collect = if view.collect_enabled {
        "ready".green()
    } else {
        "locked".yellow()
    };
    writeln!(out, "  Collect: {collect}")?;
    writeln!(out, "Wallet: {balances}")?;
    Ok(())
}

pub fn run_status(out: &mut impl Write, cfg: &RewardConfig, save_dir: &Path) -> Result<()> {
    let controller = open_file_session(cfg, save_dir);
    let anchor = controller.duration().anchor_epoch_seconds();
    let anchor_label = DateTime::from_timestamp(anchor, 0)
        .map_or_else(|| anchor.to_string(), |at| at.to_rfc3339());

    writeln!(out, "{}", "📦 Offline Rewards".bright_cyan().bold())?;
    writeln!(out, "Last collected: {anchor_label}")?;
    write_view(out, &controller.view(), controller.balances())?;
    Ok(())
}

/// Returns `false` when the collection could not be saved.
pub fn run_collect(out: &mut impl Write, cfg: &RewardConfig, save_dir: &Path) -> Result<bool> {
    let mut controller = open_file_session(cfg, save_dir);
    match controller.collect() {
        Ok(CollectOutcome::Granted(grant)) => {
            writeln!(
                out,
                "{} {} coins and {} hammers",
                "✅ Collected".green(),
                grant.coins,
                grant.hammers
            )?;
            writeln!(out, "Wallet: {}", controller.balances())?;
            Ok(true)
        }
        Ok(CollectOutcome::Rejected) => {
            let view = controller.view();
            writeln!(
                out,
                "Nothing to collect yet (offline for {}, need {} minute(s))",
                view.duration, cfg.rates.min_collect_minutes
            )?;
            Ok(true)
        }
        Err(err @ CollectError::Unsaved { .. }) => {
            eprintln!("{} {err}", "❌".red());
            log::debug!("save failure detail: {err:?}");
            Ok(false)
        }
    }
}

pub fn run_loot(out: &mut impl Write, cfg: &RewardConfig, save_dir: &Path) -> Result<()> {
    let controller = open_file_session(cfg, save_dir);
    controller.loot();
    writeln!(out, "Loot is a placeholder; nothing happened.")?;
    Ok(())
}

/// Split `seconds` of host time into whole frames of `frame_delta`.
/// Returns the frame count and the length of the final, possibly shorter, frame.
pub fn frame_plan(seconds: f64, frame_delta: f64) -> Result<(u64, f64)> {
    ensure!(
        seconds.is_finite() && seconds >= 0.0,
        "--seconds must be a finite, non-negative number (got {seconds})"
    );
    ensure!(
        frame_delta.is_finite() && frame_delta > 0.0,
        "--frame-delta must be a finite, positive number (got {frame_delta})"
    );
    let frames = (seconds / frame_delta).ceil();
    #[allow(clippy::cast_precision_loss)]
    let max_frames = MAX_SIMULATED_FRAMES as f64;
    ensure!(
        frames <= max_frames,
        "--seconds {seconds} needs {frames} frames of {frame_delta}s; the limit is {MAX_SIMULATED_FRAMES}"
    );
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let frames = frames as u64;
    if frames == 0 {
        return Ok((0, 0.0));
    }
    #[allow(clippy::cast_precision_loss)]
    let last = (seconds - frame_delta * (frames - 1) as f64).clamp(0.0, frame_delta);
    Ok((frames, last))
}

pub fn run_simulate(out: &mut impl Write, cfg: &RewardConfig, opts: &SimulateOptions) -> Result<()> {
    let (frames, last_frame) = frame_plan(opts.seconds, opts.frame_delta)?;
    let mut controller = SimulatedController::simulated(cfg);
    if let Some(speed) = opts.speed {
        controller.duration_mut().set_speed(speed);
    }
    let speed = controller.duration().speed();
    writeln!(out, "{}", "⏩ Simulated Offline Rewards".bright_yellow().bold())?;
    writeln!(out, "Speed: {}", format_speed(speed))?;

    for frame in 1..=frames {
        let step = if frame == frames {
            last_frame
        } else {
            opts.frame_delta
        };
        if let Some(view) = controller.tick(step) {
            if opts.verbose {
                writeln!(
                    out,
                    "  [{}] coins {} hammers {}{}",
                    view.duration,
                    view.coin_amount,
                    view.hammer_amount,
                    if view.collect_enabled { " *" } else { "" }
                )?;
            }
        }
    }

    write_view(out, &controller.view(), controller.balances())?;

    if opts.collect {
        match controller.collect()? {
            CollectOutcome::Granted(grant) => writeln!(
                out,
                "{} {} coins and {} hammers",
                "✅ Collected".green(),
                grant.coins,
                grant.hammers
            )?,
            CollectOutcome::Rejected => writeln!(out, "Nothing to collect yet")?,
        }
        writeln!(out, "Wallet: {}", controller.balances())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_plan_splits_partial_last_frame() {
        let (frames, last) = frame_plan(2.5, 1.0).unwrap();
        assert_eq!(frames, 3);
        assert!((last - 0.5).abs() < 1e-9);

        let (frames, last) = frame_plan(120.0, 1.0).unwrap();
        assert_eq!(frames, 120);
        assert!((last - 1.0).abs() < 1e-9);

        assert_eq!(frame_plan(0.0, 1.0).unwrap(), (0, 0.0));
    }

    #[test]
    fn frame_plan_rejects_unbounded_runs() {
        assert!(frame_plan(f64::INFINITY, 1.0).is_err());
        assert!(frame_plan(f64::NAN, 1.0).is_err());
        assert!(frame_plan(-1.0, 1.0).is_err());
        assert!(frame_plan(1e17, 1.0).is_err());
        assert!(frame_plan(60.0, 0.0).is_err());
    }
}
