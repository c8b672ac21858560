//! DST harness: simulated callers sharing one stack.
//!
//! Simulated threads take turns under a seeded scheduler. Each turn runs one
//! whole operation through [`DstRunner`], so operations interleave at the
//! granularity the lock provides. Invariants are checked every
//! `invariant_check_interval` operations and once at the end.
//!
//! Given the same seed and config, the same interleaving, workload and
//! faults are produced.

use istack::{Capacity, StackError};
use istack_core::{BoundedStackPropertyChecker, PropertyChecker};

use crate::fault::FaultConfig;
use crate::fault_injection::{DstOp, DstRunner, DstStats, DstTestableStack};
use crate::random::DeterministicRng;
use crate::scheduler::{ScheduleDecision, Scheduler};

/// Relative weights of the operations simulated threads perform.
#[derive(Debug, Clone)]
pub struct Workload {
    pub push_weight: u32,
    pub pop_weight: u32,
    pub resize_weight: u32,
    /// Largest capacity a simulated resize asks for
    pub resize_max: usize,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            push_weight: 5,
            pop_weight: 4,
            resize_weight: 1,
            resize_max: 16,
        }
    }
}

impl Workload {
    fn total_weight(&self) -> u32 {
        self.push_weight + self.pop_weight + self.resize_weight
    }
}

/// Configuration for [`DstHarness`].
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of threads to simulate
    pub threads_count: usize,
    /// Number of operations per thread
    pub operations_per_thread: u64,
    /// Probability of a context switch after each operation
    pub yield_probability: f64,
    /// Fault injection configuration
    pub fault_config: FaultConfig,
    /// Check invariants after every N operations (0 = only at the end)
    pub invariant_check_interval: u64,
    /// Capacity the stack starts with
    pub initial_capacity: Capacity,
    pub workload: Workload,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            threads_count: 4,
            operations_per_thread: 100,
            yield_probability: 0.2,
            fault_config: FaultConfig::default(),
            invariant_check_interval: 10,
            initial_capacity: Capacity::saturating(8),
            workload: Workload::default(),
        }
    }
}

impl HarnessConfig {
    /// Configuration for stress testing.
    pub fn stress() -> Self {
        Self {
            threads_count: 8,
            operations_per_thread: 1000,
            yield_probability: 0.3,
            fault_config: FaultConfig::aggressive(),
            invariant_check_interval: 100,
            initial_capacity: Capacity::saturating(32),
            workload: Workload {
                resize_max: 64,
                ..Workload::default()
            },
        }
    }

    /// Configuration for quick testing.
    pub fn quick() -> Self {
        Self {
            threads_count: 2,
            operations_per_thread: 50,
            yield_probability: 0.1,
            fault_config: FaultConfig::none(),
            invariant_check_interval: 10,
            initial_capacity: Capacity::saturating(4),
            workload: Workload::default(),
        }
    }
}

/// Result of running the harness.
#[derive(Debug, Clone)]
pub struct HarnessResult {
    /// Seed used for reproduction
    pub seed: u64,
    /// Total operations executed
    pub operations_count: u64,
    /// Context switches that occurred
    pub context_switches_count: u64,
    /// Invariant checks performed
    pub invariant_checks_count: u64,
    /// Whether all invariants held
    pub all_invariants_held: bool,
    /// First violation (if any), with its counterexample
    pub first_violation: Option<String>,
    pub stats: DstStats,
}

impl HarnessResult {
    /// Format result for display.
    pub fn format(&self) -> String {
        let status = if self.all_invariants_held { "PASS" } else { "FAIL" };
        let mut s = format!(
            "[{}] DST_SEED={} ops={} switches={} checks={} faults={}",
            status,
            self.seed,
            self.operations_count,
            self.context_switches_count,
            self.invariant_checks_count,
            self.stats.faults_injected
        );
        if let Some(ref violation) = self.first_violation {
            s.push_str("\n  VIOLATION: ");
            s.push_str(violation);
        }
        s
    }
}

/// Simulated concurrent callers over one stack.
pub struct DstHarness<S> {
    seed: u64,
    config: HarnessConfig,
    runner: DstRunner<S>,
    scheduler: Scheduler,
    workload_rng: DeterministicRng,
    next_value: Vec<i32>,
    operations_count: u64,
    context_switches_count: u64,
    invariant_checks_count: u64,
}

impl<S: DstTestableStack> DstHarness<S> {
    /// Create a harness; fails only if the initial stack cannot be allocated.
    pub fn new(seed: u64, config: HarnessConfig) -> Result<Self, StackError> {
        debug_assert!(config.threads_count > 0, "Must have at least one thread");
        debug_assert!(
            config.threads_count <= 64,
            "Too many threads for DST: {}",
            config.threads_count
        );
        debug_assert!(config.workload.total_weight() > 0, "Empty workload");

        let runner = DstRunner::with_fault_config(
            seed,
            config.initial_capacity,
            config.fault_config.clone(),
        )?;
        let scheduler = Scheduler::new(
            DeterministicRng::new(seed.wrapping_add(2)),
            config.threads_count,
            config.yield_probability,
        );

        Ok(Self {
            seed,
            runner,
            scheduler,
            workload_rng: DeterministicRng::new(seed.wrapping_add(3)),
            next_value: vec![0; config.threads_count],
            config,
            operations_count: 0,
            context_switches_count: 0,
            invariant_checks_count: 0,
        })
    }

    /// Get the seed for reproduction.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The runner, for inspecting bookkeeping after a run.
    pub fn runner(&self) -> &DstRunner<S> {
        &self.runner
    }

    /// Values are unique per (thread, sequence) to keep counterexamples readable.
    fn next_op(&mut self, thread: usize) -> DstOp {
        let workload = &self.config.workload;
        let roll = self.workload_rng.gen_range(0..workload.total_weight());
        if roll < workload.push_weight {
            let seq = self.next_value[thread];
            self.next_value[thread] += 1;
            DstOp::Push(thread as i32 * 1_000_000 + seq)
        } else if roll < workload.push_weight + workload.pop_weight {
            DstOp::Pop
        } else {
            let resize_max = workload.resize_max.max(1);
            DstOp::Resize(self.workload_rng.gen_range(1..=resize_max))
        }
    }

    fn check_invariants(&mut self) -> Option<String> {
        self.invariant_checks_count += 1;
        let mut checker = BoundedStackPropertyChecker::new(&self.runner);
        if self.seed != 0 {
            checker = checker.with_seed(self.seed);
        }
        checker.violations().into_iter().next().map(|failed| {
            match failed.counterexample {
                Some(ref ce) => format!("{}\n{}", failed, ce.render_diagram()),
                None => failed.to_string(),
            }
        })
    }

    /// Run every simulated thread to completion, stopping at the first
    /// violation.
    pub fn run(&mut self) -> HarnessResult {
        let mut remaining = vec![self.config.operations_per_thread; self.config.threads_count];
        let mut violation = None;

        while remaining.iter().any(|&r| r > 0) {
            let thread = self.scheduler.current_thread();
            if remaining[thread] == 0 {
                self.scheduler.force_switch();
                continue;
            }

            let op = self.next_op(thread);
            // A crashed caller is expected; the bookkeeping stays consistent.
            let _ = self.runner.execute(thread as u64, op);
            remaining[thread] -= 1;
            self.operations_count += 1;

            let interval = self.config.invariant_check_interval;
            if interval > 0 && self.operations_count % interval == 0 {
                violation = self.check_invariants();
                if violation.is_some() {
                    break;
                }
            }

            if let ScheduleDecision::SwitchTo(_) = self.scheduler.decide() {
                self.context_switches_count += 1;
            }
        }

        if violation.is_none() {
            violation = self.check_invariants();
        }

        HarnessResult {
            seed: self.seed,
            operations_count: self.operations_count,
            context_switches_count: self.context_switches_count,
            invariant_checks_count: self.invariant_checks_count,
            all_invariants_held: violation.is_none(),
            first_violation: violation,
            stats: self.runner.stats(),
        }
    }
}
