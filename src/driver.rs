//! The valuation driver: sets up a job, runs it, and collects aggregates (§4.8)
//!
//! `run_valuation` is the single entry point external callers use. It
//! validates inputs, allocates the shared buffer, partitions scenarios
//! into tasks distributed round-robin across worker deques, runs the
//! workers to completion (or failure, or cancellation), and hands the
//! dense result array to the aggregator.

use crate::aggregator::{AggregateStatistics, Aggregator};
use crate::assumptions::Assumptions;
use crate::buffer::SharedBuffer;
use crate::error::{ValuationError, ValuationResult};
use crate::policy::Policy;
use crate::projection::{project_policy, Multipliers};
use crate::scenario::{ScenarioParams, ScenarioPath};
use crate::scheduler::{partition_tasks, termination_threshold, Deque, TerminationFlag};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Polled by the driver between progress updates; implementors decide how
/// cancellation is signalled (timer, external request, etc).
pub trait CancellationToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// A cancellation token backed by a plain atomic flag.
#[derive(Default)]
pub struct AtomicCancellationToken(std::sync::atomic::AtomicBool);

impl AtomicCancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancellationToken for AtomicCancellationToken {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct DriverOptions<'a> {
    pub worker_count: usize,
    pub chunk_size: u32,
    pub retain_distribution: bool,
    pub reproducible_mode: bool,
    pub progress_report_interval_tasks: u32,
    pub cancellation_token: Option<&'a dyn CancellationToken>,
    pub progress_callback: Option<&'a (dyn Fn(u8) + Sync)>,
}

impl<'a> Default for DriverOptions<'a> {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .clamp(1, 64),
            chunk_size: 32,
            retain_distribution: false,
            reproducible_mode: true,
            progress_report_interval_tasks: 8,
            cancellation_token: None,
            progress_callback: None,
        }
    }
}

#[derive(Debug)]
pub struct ValuationResultDetail {
    pub statistics: AggregateStatistics,
    pub execution_time_ms: u64,
}

/// Run one full valuation job over `portfolio` and `scenario_count`
/// stochastic scenarios. See §4.8 for the procedure this follows.
pub fn run_valuation(
    portfolio: &[Policy],
    assumptions: &Assumptions,
    scenario_params: &ScenarioParams,
    multipliers: &Multipliers,
    master_seed: u64,
    scenario_count: u32,
    options: DriverOptions,
) -> ValuationResult<ValuationResultDetail> {
    let start = Instant::now();

    validate_inputs(portfolio, scenario_params, multipliers, scenario_count, &options)?;

    let worker_count = options.worker_count.clamp(1, 64);
    let max_term = portfolio.iter().map(|p| p.term as u32).max().unwrap_or(0);

    let buffer = SharedBuffer::new(
        portfolio,
        assumptions,
        scenario_count as usize,
        worker_count + 2,
        options.retain_distribution,
    )?;

    let tasks = partition_tasks(scenario_count, options.chunk_size);
    let deque_capacity = (tasks.len() / worker_count.max(1) + 2).next_power_of_two();
    let deques: Vec<Deque> = (0..worker_count).map(|_| Deque::with_capacity(deque_capacity)).collect();
    for (i, task) in tasks.iter().enumerate() {
        let owner = i % worker_count;
        if !deques[owner].push(*task) {
            return Err(ValuationError::ResourceExhausted(format!(
                "deque {owner} capacity {deque_capacity} exceeded while distributing tasks"
            )));
        }
    }

    let termination = TerminationFlag::new();
    let progress_counter = AtomicU32::new(0);
    let workers_done = AtomicUsize::new(0);
    let first_error: Mutex<Option<ValuationError>> = Mutex::new(None);
    let failed_tasks: Mutex<Vec<crate::scheduler::Task>> = Mutex::new(Vec::new());
    let total_tasks = tasks.len() as u32;
    let interval = options.progress_report_interval_tasks.max(1);

    std::thread::scope(|scope| {
        for worker_id in 0..worker_count {
            let deques = &deques;
            let termination = &termination;
            let progress_counter = &progress_counter;
            let workers_done = &workers_done;
            let first_error = &first_error;
            let failed_tasks = &failed_tasks;
            let buffer = &buffer;
            scope.spawn(move || {
                run_worker(
                    worker_id,
                    deques,
                    max_term,
                    buffer,
                    portfolio,
                    assumptions,
                    scenario_params,
                    multipliers,
                    master_seed,
                    termination,
                    progress_counter,
                    interval,
                    first_error,
                    failed_tasks,
                );
                workers_done.fetch_add(1, Ordering::SeqCst);
            });
        }

        // Driver-side polling loop: invoke progress_callback and check
        // cancellation. Runs concurrently with the scoped worker threads
        // above, which is why this loop lives inside the `scope` block
        // rather than after it.
        loop {
            if workers_done.load(Ordering::SeqCst) >= worker_count {
                break;
            }
            if let Some(token) = options.cancellation_token {
                if token.is_cancelled() {
                    termination.set();
                }
            }
            if let Some(callback) = options.progress_callback {
                let completed = progress_counter.load(Ordering::SeqCst);
                let percent = if total_tasks == 0 {
                    100
                } else {
                    ((completed as u64 * 100) / total_tasks as u64).min(100) as u8
                };
                callback(percent);
            }
            std::thread::yield_now();
        }
    });

    if let Some(token) = options.cancellation_token {
        if token.is_cancelled() {
            return Err(ValuationError::Cancelled);
        }
    }
    if let Some(err) = first_error.into_inner().unwrap() {
        return Err(err);
    }

    let npvs = buffer.results().to_vec();
    let _ = options.reproducible_mode; // buffer always writes index-addressed slots (§4.5 note)
    let statistics = Aggregator::new(options.retain_distribution).aggregate(&npvs);

    Ok(ValuationResultDetail {
        statistics,
        execution_time_ms: start.elapsed().as_millis() as u64,
    })
}

fn validate_inputs(
    portfolio: &[Policy],
    scenario_params: &ScenarioParams,
    multipliers: &Multipliers,
    scenario_count: u32,
    options: &DriverOptions,
) -> ValuationResult<()> {
    if portfolio.is_empty() {
        return Err(ValuationError::InvalidInput("portfolio must not be empty".to_string()));
    }
    if scenario_count == 0 {
        return Err(ValuationError::InvalidInput("scenario_count must be positive".to_string()));
    }
    // Task encoding (scheduler::Task) packs an absolute scenario `start`
    // into 16 bits (src/scheduler.rs), so no scenario index may reach
    // 65,536 or `start as u16` truncates and silently aliases two
    // scenarios onto one result slot.
    const MAX_SCENARIO_COUNT: u32 = 1 << 16;
    if scenario_count > MAX_SCENARIO_COUNT {
        return Err(ValuationError::CapacityExceeded(format!(
            "scenario_count {scenario_count} exceeds the hard limit of {MAX_SCENARIO_COUNT} implied by the 16-bit task encoding"
        )));
    }
    const MAX_POLICY_COUNT: usize = 1 << 24;
    if portfolio.len() > MAX_POLICY_COUNT {
        return Err(ValuationError::CapacityExceeded(format!(
            "policy_count {} exceeds the hard limit {MAX_POLICY_COUNT}",
            portfolio.len()
        )));
    }
    for policy in portfolio {
        policy.validate().map_err(ValuationError::InvalidInput)?;
    }
    scenario_params.validate().map_err(ValuationError::InvalidInput)?;
    multipliers.validate().map_err(ValuationError::InvalidInput)?;
    if options.chunk_size == 0 || options.chunk_size > 65_535 {
        return Err(ValuationError::InvalidInput(format!(
            "chunk_size {} must be in [1,65535]",
            options.chunk_size
        )));
    }
    if options.worker_count == 0 {
        return Err(ValuationError::InvalidInput("worker_count must be positive".to_string()));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_id: usize,
    deques: &[Deque],
    max_term: u32,
    buffer: &SharedBuffer,
    portfolio: &[Policy],
    assumptions: &Assumptions,
    scenario_params: &ScenarioParams,
    multipliers: &Multipliers,
    master_seed: u64,
    termination: &TerminationFlag,
    progress_counter: &AtomicU32,
    progress_interval: u32,
    first_error: &Mutex<Option<ValuationError>>,
    failed_tasks: &Mutex<Vec<crate::scheduler::Task>>,
) {
    let own = &deques[worker_id];
    let worker_count = deques.len();
    let threshold = termination_threshold(worker_count);
    let mut empty_passes = 0usize;
    let mut completed_since_report = 0u32;

    log::debug!("worker {worker_id} starting");

    loop {
        if termination.is_set() {
            log::debug!("worker {worker_id} observed termination flag, draining its deque");
            own.drain();
            return;
        }

        let task = own.pop().or_else(|| steal_from_a_peer(deques, worker_id));

        match task {
            Some(task) => {
                empty_passes = 0;
                log::trace!("worker {worker_id} took task start={} count={}", task.start(), task.count());
                let result = run_task(
                    task,
                    max_term,
                    buffer,
                    portfolio,
                    assumptions,
                    scenario_params,
                    multipliers,
                    master_seed,
                    termination,
                );
                if let Err(err) = result {
                    log::debug!("worker {worker_id} failed on task start={}: {err}", task.start());
                    let mut slot = first_error.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                    drop(slot);
                    termination.set();
                    let mut failed = failed_tasks.lock().unwrap();
                    failed.push(task);
                    failed.extend(own.drain());
                    return;
                }
                completed_since_report += 1;
                if completed_since_report >= progress_interval {
                    progress_counter.fetch_add(completed_since_report, Ordering::SeqCst);
                    completed_since_report = 0;
                }
            }
            None => {
                empty_passes += 1;
                if empty_passes > threshold {
                    if completed_since_report > 0 {
                        progress_counter.fetch_add(completed_since_report, Ordering::SeqCst);
                    }
                    log::debug!("worker {worker_id} terminating: peers empty for {empty_passes} passes");
                    return;
                }
                log::trace!("worker {worker_id} found no work this pass, stealing");
                std::thread::yield_now();
            }
        }
    }
}

fn steal_from_a_peer(deques: &[Deque], own_id: usize) -> Option<crate::scheduler::Task> {
    let worker_count = deques.len();
    if worker_count <= 1 {
        return None;
    }
    // Deterministic round-robin victim order starting just after ourselves;
    // the scheduler's safety properties don't depend on randomising this,
    // only on retrying a victim on ABORT and moving on on EMPTY (§4.7).
    for offset in 1..worker_count {
        let victim = (own_id + offset) % worker_count;
        if let Some(task) = deques[victim].steal() {
            return Some(task);
        }
    }
    log::trace!("worker {own_id} found every peer empty this pass");
    None
}

/// Run every scenario in `task`, writing each into its pre-assigned result
/// slot. Checks `termination` once per scenario (not just once per task) so
/// a cancellation or a peer's failure is observed within one scenario's
/// projection latency even at the maximum chunk size, per §5's "every N
/// years of the inner kernel" cancellation bound applied at the task
/// granularity above it.
#[allow(clippy::too_many_arguments)]
fn run_task(
    task: crate::scheduler::Task,
    max_term: u32,
    buffer: &SharedBuffer,
    portfolio: &[Policy],
    assumptions: &Assumptions,
    scenario_params: &ScenarioParams,
    multipliers: &Multipliers,
    master_seed: u64,
    termination: &TerminationFlag,
) -> ValuationResult<()> {
    let start = task.start() as u32;
    let count = task.count() as u32;
    for s in start..(start + count) {
        if termination.is_set() {
            return Ok(());
        }
        let path = ScenarioPath::generate(master_seed, s, max_term, scenario_params);
        let mut total = 0.0f64;
        for policy in portfolio {
            total += project_policy(policy, assumptions, multipliers, &path, s)?;
        }
        unsafe {
            buffer.write_result(s as usize, total);
        }
    }
    Ok(())
}
