//! Callcenter simulator command line
//!
//! Reads a model JSON file, runs it and writes the statistics as JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use callcenter_simulator_core_rs::{
    CallcenterModel, CarryoverSnapshot, Simulator, SimulatorOptions, WarningStatus,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Discrete-event callcenter simulator", long_about = None)]
struct Args {
    /// Model file (JSON)
    model: PathBuf,

    /// Statistics output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum number of replica threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// Memory available for the run in MB; detected when omitted
    #[arg(long)]
    memory_mb: Option<u64>,

    /// Override the number of simulated days
    #[arg(long)]
    days: Option<u32>,

    /// Override the model seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write every processed event as JSON lines (single thread)
    #[arg(long)]
    execution_log: Option<PathBuf>,

    /// Carryover snapshot of a previous run to start from
    #[arg(long)]
    carryover_in: Option<PathBuf>,

    /// Write the carryover snapshot of this run
    #[arg(long)]
    carryover_out: Option<PathBuf>,

    /// Share of lost clients calling again in the follow-up run
    #[arg(long, default_value = "0.0")]
    retry_probability: f64,

    /// Let replica threads yield regularly
    #[arg(long)]
    low_priority: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let text = std::fs::read_to_string(&args.model)
        .with_context(|| format!("reading model {}", args.model.display()))?;
    let mut model: CallcenterModel = serde_json::from_str(&text)
        .with_context(|| format!("parsing model {}", args.model.display()))?;
    if let Some(days) = args.days {
        model.days = days;
    }
    if let Some(seed) = args.seed {
        model.seed = seed;
    }
    if let Some(path) = &args.carryover_in {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading carryover {}", path.display()))?;
        CarryoverSnapshot::from_json(&json)?.apply_to(&mut model)?;
    }

    let mut options = SimulatorOptions {
        memory_mb: args.memory_mb,
        execution_log: args.execution_log.is_some(),
        low_priority: args.low_priority,
        ..SimulatorOptions::default()
    };
    if let Some(threads) = args.threads {
        if threads == 0 {
            bail!("--threads must be at least 1");
        }
        options.max_threads = threads;
    }

    let mut simulator = Simulator::new(model, options).context("validating model")?;
    info!(threads = simulator.thread_count(), "Run planned");

    simulator.start()?;
    while simulator.is_running() {
        std::thread::sleep(Duration::from_millis(500));
        info!(
            days = simulator.sim_day_count(),
            of = simulator.sim_days_count(),
            events = simulator.event_count(),
            "Progress"
        );
    }
    simulator.finalize_run()?;
    let statistics = simulator.collect_statistic()?.clone();

    for warning in &statistics.warnings {
        if warning.status != WarningStatus::Ok {
            warn!(
                metric = ?warning.rule.metric,
                value = warning.value,
                status = ?warning.status,
                "Threshold exceeded"
            );
        }
    }

    let json = serde_json::to_string_pretty(&statistics).context("serializing statistics")?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing statistics {}", path.display()))?,
        None => println!("{}", json),
    }

    if let (Some(path), Some(log)) = (&args.execution_log, simulator.execution_log()) {
        let file = File::create(path)
            .with_context(|| format!("creating execution log {}", path.display()))?;
        let mut out = BufWriter::new(file);
        for entry in log.entries() {
            serde_json::to_writer(&mut out, entry)?;
            writeln!(out)?;
        }
        out.flush()?;
        info!(entries = log.len(), path = %path.display(), "Execution log written");
    }

    if let Some(path) = &args.carryover_out {
        let snapshot = CarryoverSnapshot::from_statistics(&statistics, args.retry_probability)?;
        std::fs::write(path, snapshot.to_json()?)
            .with_context(|| format!("writing carryover {}", path.display()))?;
        info!(callers = snapshot.caller_count(), "Carryover snapshot written");
    }

    Ok(())
}
