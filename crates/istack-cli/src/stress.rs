//! Multi-threaded stress run with invariant checking.

use std::sync::Arc;
use std::thread;

use istack::{Capacity, PopOutcome, StackError, TrackedStack};
use istack_core::{BoundedStackProperties, BoundedStackPropertyChecker, PropertyChecker};
use istack_dst::DeterministicRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CliError;

/// Parameters of a stress run.
#[derive(Debug, Clone)]
pub struct StressConfig {
    pub threads: usize,
    pub ops_per_thread: usize,
    /// Every Nth operation of a thread is a resize (0 disables resizing)
    pub resize_every: usize,
    pub seed: u64,
    pub capacity: Capacity,
}

/// Result of one property.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyReport {
    pub name: &'static str,
    pub holds: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<String>,
}

/// JSON report of a stress run.
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub seed: u64,
    pub threads: usize,
    pub ops_per_thread: usize,
    pub resize_every: usize,
    pub pushed: usize,
    pub popped: usize,
    pub truncated: usize,
    pub full_rejections: usize,
    pub final_capacity: usize,
    pub conserved: bool,
    pub properties: Vec<PropertyReport>,
    pub passed: bool,
}

/// Each thread's operation choices come from its own seeded generator;
/// the interleaving is left to the OS scheduler.
fn worker(stack: &TrackedStack, config: &StressConfig, thread_id: usize) -> usize {
    let mut rng = DeterministicRng::new(config.seed.wrapping_add(thread_id as u64));
    let mut full_rejections = 0;
    let capacity_max = config.capacity.get().saturating_mul(2).max(2);

    for i in 0..config.ops_per_thread {
        if config.resize_every > 0 && (i + 1) % config.resize_every == 0 {
            let _ = stack.resize(thread_id as u64, rng.gen_range(1..=capacity_max));
            continue;
        }
        if rng.gen_bool(0.55) {
            let value = (thread_id * config.ops_per_thread + i) as i32;
            if let Err(StackError::Full) = stack.push(thread_id as u64, value) {
                full_rejections += 1;
            }
        } else {
            stack.pop(thread_id as u64);
        }
    }
    full_rejections
}

/// Join every worker, then report the first one that panicked.
fn join_workers(handles: Vec<thread::ScopedJoinHandle<'_, usize>>) -> Result<usize, CliError> {
    let results: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
    let mut total = 0;
    for (thread_id, result) in results.into_iter().enumerate() {
        total += result.map_err(|_| CliError::WorkerPanicked(thread_id))?;
    }
    Ok(total)
}

/// Run the workload, drain the stack, check every invariant.
pub fn run(config: &StressConfig) -> Result<StressReport, CliError> {
    let stack = Arc::new(TrackedStack::new(config.capacity).map_err(CliError::Config)?);
    info!(
        threads = config.threads,
        ops = config.ops_per_thread,
        seed = config.seed,
        "stress run starting"
    );

    let full_rejections = thread::scope(|s| {
        let handles: Vec<_> = (0..config.threads)
            .map(|t| {
                let stack = Arc::clone(&stack);
                s.spawn(move || worker(&stack, config, t))
            })
            .collect();
        join_workers(handles)
    })
    .inspect_err(|e| warn!(error = %e, "stress run aborted"))?;

    while let PopOutcome::Value(_) = stack.pop(u64::MAX) {}

    let pushed = stack.pushed_elements().len();
    let popped = stack.popped_elements().len();
    let truncated = stack.truncated_elements().len();
    let conserved = pushed == popped + truncated && stack.inner().is_empty();

    let checker = BoundedStackPropertyChecker::new(stack.as_ref());
    let properties: Vec<PropertyReport> = checker
        .check_all()
        .into_iter()
        .map(|r| PropertyReport {
            name: r.name,
            holds: r.holds,
            violation: r.violation,
        })
        .collect();
    let passed = conserved && properties.iter().all(|p| p.holds);

    if passed {
        info!(pushed, popped, truncated, "stress run passed");
    } else {
        warn!(pushed, popped, truncated, conserved, "stress run found violations");
    }

    Ok(StressReport {
        seed: config.seed,
        threads: config.threads,
        ops_per_thread: config.ops_per_thread,
        resize_every: config.resize_every,
        pushed,
        popped,
        truncated,
        full_rejections,
        final_capacity: stack.inner().capacity(),
        conserved,
        properties,
        passed,
    })
}

impl StressReport {
    /// Failed properties, plus one if conservation failed.
    #[must_use]
    pub fn violations_count(&self) -> usize {
        self.properties.iter().filter(|p| !p.holds).count() + usize::from(!self.conserved)
    }
}
