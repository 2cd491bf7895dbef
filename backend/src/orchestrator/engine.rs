//! Simulator engine
//!
//! Runs a validated model on several replica threads and merges their
//! statistics.
//!
//! # Lifecycle
//!
//! ```text
//! Simulator::new   validate model, plan threads
//! start            spawn one replica thread per day range
//! is_running       poll; event_count / sim_day_count report progress
//! finalize_run     join all threads
//! collect_statistic merge replicas in index order, finalize (memoized)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use callcenter_simulator_core_rs::orchestrator::{Simulator, SimulatorOptions};
//!
//! let mut simulator = Simulator::new(model, SimulatorOptions::default())?;
//! simulator.start()?;
//! simulator.finalize_run()?;
//! let statistics = simulator.collect_statistic()?;
//! println!("{} calls", statistics.callers_global.calls.count);
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::threads::{partition_days, plan_threads, system_memory_mb};
use crate::config::{CallcenterModel, ModelError, RunModel};
use crate::models::ExecutionLog;
use crate::replica::{Replica, ReplicaOutput, RunControl};
use crate::statistics::{Statistics, StatisticsError};

// ============================================================================
// Configuration Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorOptions {
    /// Upper bound for replica threads
    pub max_threads: usize,
    /// Memory available for the run; detected when `None`
    pub memory_mb: Option<u64>,
    /// Record every event (forces a single thread)
    pub execution_log: bool,
    /// Let replica threads yield regularly
    pub low_priority: bool,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            max_threads: num_cpus::get(),
            memory_mb: None,
            execution_log: false,
            low_priority: false,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("Invalid model: {0}")]
    InvalidModel(#[from] ModelError),

    #[error("Statistics error: {0}")]
    Statistics(#[from] StatisticsError),

    #[error("Simulation was already started")]
    AlreadyStarted,

    #[error("Simulation has not been started")]
    NotStarted,

    #[error("Simulation is still running")]
    StillRunning,

    #[error("Simulation was cancelled")]
    Cancelled,

    #[error("Replica thread {replica} could not be started: {reason}")]
    ThreadSpawn { replica: usize, reason: String },

    #[error("Replica thread {replica} panicked")]
    ReplicaPanicked { replica: usize },

    #[error("Statistics are not available: {0}")]
    StatisticsUnavailable(String),

    #[error("Carryover does not fit the model: {0}")]
    CarryoverMismatch(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// Simulator
// ============================================================================

pub struct Simulator {
    run: Arc<RunModel>,
    options: SimulatorOptions,
    threads: usize,
    control: Arc<RunControl>,
    handles: Vec<JoinHandle<ReplicaOutput>>,
    outputs: Vec<ReplicaOutput>,
    started: Option<Instant>,
    runtime: Option<Duration>,
    finalized: bool,
    failure: Option<String>,
    statistics: Option<Statistics>,
    log: Option<ExecutionLog>,
}

impl Simulator {
    /// Validates `model` and plans the run.
    ///
    /// # Errors
    /// Returns [`SimulationError::InvalidModel`] if a consistency check fails.
    pub fn new(model: CallcenterModel, options: SimulatorOptions) -> Result<Self, SimulationError> {
        let run = RunModel::new(model)?;
        Ok(Self::from_run_model(run, options))
    }

    /// Plans a run of an already validated model.
    pub fn from_run_model(run: RunModel, options: SimulatorOptions) -> Self {
        let memory_mb = options.memory_mb.unwrap_or_else(system_memory_mb);
        let threads = plan_threads(
            memory_mb,
            run.agents.len(),
            run.fresh_calls_per_day(),
            u64::from(run.days),
            options.max_threads,
            options.execution_log,
        );
        let control = RunControl::default();
        control
            .low_priority
            .store(options.low_priority, Ordering::Relaxed);
        Self {
            run: Arc::new(run),
            options,
            threads,
            control: Arc::new(control),
            handles: Vec::new(),
            outputs: Vec::new(),
            started: None,
            runtime: None,
            finalized: false,
            failure: None,
            statistics: None,
            log: None,
        }
    }

    pub fn run_model(&self) -> &RunModel {
        &self.run
    }

    /// Number of replica threads the run uses.
    pub fn thread_count(&self) -> usize {
        self.threads
    }

    /// Spawns the replica threads.
    pub fn start(&mut self) -> Result<(), SimulationError> {
        if self.started.is_some() {
            return Err(SimulationError::AlreadyStarted);
        }
        let days = u64::from(self.run.days);
        info!(
            model = %self.run.model.name,
            threads = self.threads,
            days,
            "Simulation started"
        );
        self.started = Some(Instant::now());

        for (index, (first_day, count)) in partition_days(days, self.threads).into_iter().enumerate() {
            let replica = Replica::new(
                index,
                Arc::clone(&self.run),
                first_day,
                count,
                self.options.execution_log,
            );
            let control = Arc::clone(&self.control);
            let handle = std::thread::Builder::new()
                .name(format!("replica-{}", index))
                .spawn(move || replica.run(&control))
                .map_err(|e| SimulationError::ThreadSpawn {
                    replica: index,
                    reason: e.to_string(),
                })?;
            self.handles.push(handle);
        }
        Ok(())
    }

    /// Asks all replicas to stop after their current batch of events.
    pub fn cancel(&self) {
        self.control.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Advisory: low priority replicas yield the CPU regularly.
    pub fn set_priority(&self, low: bool) {
        self.control.low_priority.store(low, Ordering::Relaxed);
    }

    /// Waits for all replica threads.
    ///
    /// # Errors
    /// Fails if the run was not started, was cancelled or a replica thread
    /// panicked. The statistics are unavailable in these cases.
    pub fn finalize_run(&mut self) -> Result<(), SimulationError> {
        if self.finalized {
            return Ok(());
        }
        let Some(started) = self.started else {
            return Err(SimulationError::NotStarted);
        };

        let mut panicked = None;
        for (index, handle) in std::mem::take(&mut self.handles).into_iter().enumerate() {
            match handle.join() {
                Ok(output) => self.outputs.push(output),
                Err(_) => {
                    warn!(replica = index, "Replica thread panicked");
                    panicked.get_or_insert(index);
                }
            }
        }
        self.runtime = Some(started.elapsed());
        self.finalized = true;
        self.outputs.sort_by_key(|o| o.index);

        if let Some(replica) = panicked {
            let error = SimulationError::ReplicaPanicked { replica };
            self.failure = Some(error.to_string());
            return Err(error);
        }
        if self.control.is_cancelled() {
            self.failure = Some(SimulationError::Cancelled.to_string());
            return Err(SimulationError::Cancelled);
        }
        info!(
            events = self.event_count(),
            events_per_second = self.events_per_second(),
            runtime_ms = self.runtime.map_or(0, |d| d.as_millis() as u64),
            "Simulation finished"
        );
        Ok(())
    }

    /// Merges the replica statistics in replica order and finalizes the
    /// result. Computed once; later calls return the same statistics.
    pub fn collect_statistic(&mut self) -> Result<&Statistics, SimulationError> {
        if self.statistics.is_none() {
            let statistics = self.merge_outputs()?;
            self.statistics = Some(statistics);
        }
        self.statistics
            .as_ref()
            .ok_or_else(|| SimulationError::StatisticsUnavailable("no result".to_string()))
    }

    fn merge_outputs(&mut self) -> Result<Statistics, SimulationError> {
        if !self.finalized {
            if self.is_running() {
                return Err(SimulationError::StillRunning);
            }
            self.finalize_run()?;
        }
        if let Some(reason) = &self.failure {
            return Err(SimulationError::StatisticsUnavailable(reason.clone()));
        }
        if self.outputs.is_empty() {
            return Err(SimulationError::StatisticsUnavailable(
                "replica results were already consumed".to_string(),
            ));
        }

        let mut outputs = std::mem::take(&mut self.outputs).into_iter();
        let Some(first) = outputs.next() else {
            return Err(SimulationError::StatisticsUnavailable(
                "no replica results".to_string(),
            ));
        };
        let mut merged = first.statistics;
        let mut log = first.log;
        for output in outputs {
            merged.merge(&output.statistics)?;
            if let (Some(log), Some(other)) = (log.as_mut(), output.log) {
                log.append(other);
            }
        }
        self.log = log;

        self.stamp_metadata(&mut merged);
        merged.finalize(&self.run);
        Ok(merged)
    }

    fn stamp_metadata(&self, statistics: &mut Statistics) {
        let metadata = &mut statistics.metadata;
        metadata.run_id = Uuid::new_v4().to_string();
        metadata.user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default();
        metadata.host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_default();
        metadata.os = std::env::consts::OS.to_string();
        metadata.date = Utc::now().to_rfc3339();
        metadata.runtime_ms = self.runtime.map_or(0, |d| d.as_millis() as u64);
        metadata.threads = self.threads;
    }

    /// Events processed so far by all replicas.
    pub fn event_count(&self) -> u64 {
        self.control.events.load(Ordering::Relaxed)
    }

    pub fn events_per_second(&self) -> f64 {
        let elapsed = match (self.runtime, self.started) {
            (Some(runtime), _) => runtime,
            (None, Some(started)) => started.elapsed(),
            (None, None) => return 0.0,
        };
        let seconds = elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return 0.0;
        }
        self.event_count() as f64 / seconds
    }

    /// Days simulated so far by all replicas.
    pub fn sim_day_count(&self) -> u64 {
        self.control.days_done.load(Ordering::Relaxed)
    }

    /// Days the run simulates in total.
    pub fn sim_days_count(&self) -> u64 {
        u64::from(self.run.days)
    }

    /// Execution log of the run, available after `collect_statistic`.
    pub fn execution_log(&self) -> Option<&ExecutionLog> {
        self.log.as_ref()
    }
}

/// Runs `model` to completion and returns its finalized statistics.
pub fn simulate(model: CallcenterModel, options: SimulatorOptions) -> Result<Statistics, SimulationError> {
    let mut simulator = Simulator::new(model, options)?;
    simulator.start()?;
    simulator.finalize_run()?;
    simulator.collect_statistic().cloned()
}
