mod reports;
mod scenarios;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use idlevault_game::RewardConfig;
use session::SimulateOptions;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    /// Coloured human-readable summary
    Console,
    /// Machine-readable JSON array of scenario results
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "idlevault-tester", version = "0.1.0")]
#[command(about = "Host and acceptance tester for idlevault offline rewards")]
struct Args {
    /// Reward configuration file (defaults to the bundled configuration)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory the save folder lives in
    #[arg(long, global = true, default_value = ".")]
    save_dir: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Optional path to write output to instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the offline-reward popup values for the real-clock save
    Status,
    /// Collect accrued rewards from the real-clock save
    Collect,
    /// Loot placeholder (no-op)
    Loot,
    /// Run the development clock without touching the save
    Simulate {
        /// Simulated host time to run, in seconds (before speed scaling)
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,

        /// Host frame delta in seconds
        #[arg(long, default_value_t = 1.0)]
        frame_delta: f64,

        /// Speed multiplier override (clamped to the configured range)
        #[arg(long)]
        speed: Option<f64>,

        /// Collect once the run finishes
        #[arg(long)]
        collect: bool,
    },
    /// Run the acceptance scenario catalog against in-memory stores
    Scenarios {
        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
        report: ReportFormat,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let cfg = load_config(&args)?;
    let mut output_target = OutputTarget::new(args.output.clone())?;

    let success = match &args.command {
        Command::Status => {
            session::run_status(&mut output_target, &cfg, &args.save_dir)?;
            true
        }
        Command::Collect => session::run_collect(&mut output_target, &cfg, &args.save_dir)?,
        Command::Loot => {
            session::run_loot(&mut output_target, &cfg, &args.save_dir)?;
            true
        }
        Command::Simulate {
            seconds,
            frame_delta,
            speed,
            collect,
        } => {
            let opts = SimulateOptions {
                seconds: *seconds,
                frame_delta: *frame_delta,
                speed: *speed,
                collect: *collect,
                verbose: args.verbose,
            };
            session::run_simulate(&mut output_target, &cfg, &opts)?;
            true
        }
        Command::Scenarios { report } => run_scenarios(&mut output_target, *report)?,
    };

    output_target.flush_inner()?;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<RewardConfig> {
    match &args.config {
        Some(path) => RewardConfig::from_path(path)
            .with_context(|| format!("invalid reward config {}", path.display())),
        None => Ok(RewardConfig::load_from_static()),
    }
}

fn run_scenarios(out: &mut OutputTarget, report: ReportFormat) -> Result<bool> {
    let start_time = Instant::now();
    if matches!(report, ReportFormat::Console) {
        writeln!(out, "{}", "🪙 idlevault Acceptance Scenarios".bright_cyan().bold())?;
        writeln!(out, "{}", "================================".cyan())?;
    }

    let results = scenarios::run_catalog();

    match report {
        ReportFormat::Json => reports::generate_json_report(out, &results)?,
        ReportFormat::Console => {
            reports::generate_console_report(out, &results, start_time.elapsed())?;
        }
    }

    Ok(results.iter().all(|r| r.passed))
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(writer) => writer.flush(),
            Self::File(writer) => writer.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Stdout(writer) => writer.write(buf),
            Self::File(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
