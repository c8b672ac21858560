//! Fault injection around bounded stack operations.
//!
//! Faults are injected at OPERATION BOUNDARIES, never inside the locked
//! section. The stack under test is called exactly as production callers
//! call it.
//!
//! | Fault | Boundary | Effect |
//! |-------|----------|--------|
//! | AllocationFailure | before resize | resize asks for an unallocatable buffer, stack untouched |
//! | CallerCrash | before any op | operation never starts |
//! | CallerCrash | after any op | operation applied, caller never sees the result |
//! | Delay | either | simulated time passes, operation proceeds |

use istack::{BoundedStack, Capacity, PopOutcome, StackError, StackSnapshot};
use istack_core::invariants::{BoundedStackProperties, StackHistory, StackOpType};

use crate::env::DstEnv;
use crate::fault::FaultConfig;

/// Capacity whose buffer can never be allocated. An injected allocation
/// failure resizes to this, so the stack's own rollback path runs.
pub const UNALLOCATABLE_CAPACITY: usize = usize::MAX;

/// Where a fault is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Before starting an operation
    BeforeOperation,
    /// After the operation completed, before the caller sees the result
    AfterOperation,
}

/// Kinds of injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// Buffer allocation for a resize fails
    AllocationFailure,
    /// The caller disappears
    CallerCrash,
    /// The caller is slow
    Delay,
}

/// Stacks that can run under the DST runner.
///
/// Same surface production callers use; no simulation hooks.
pub trait DstTestableStack: Send + Sync {
    fn create(capacity: Capacity) -> Result<Self, StackError>
    where
        Self: Sized;
    fn push(&self, value: i32) -> Result<(), StackError>;
    fn pop(&self) -> PopOutcome;
    fn resize(&self, new_capacity: usize) -> Result<(), StackError>;
    fn snapshot(&self) -> StackSnapshot;
}

impl DstTestableStack for BoundedStack {
    fn create(capacity: Capacity) -> Result<Self, StackError> {
        BoundedStack::new(capacity)
    }

    fn push(&self, value: i32) -> Result<(), StackError> {
        BoundedStack::push(self, value)
    }

    fn pop(&self) -> PopOutcome {
        BoundedStack::pop(self)
    }

    fn resize(&self, new_capacity: usize) -> Result<(), StackError> {
        BoundedStack::resize(self, new_capacity)
    }

    fn snapshot(&self) -> StackSnapshot {
        BoundedStack::snapshot(self)
    }
}

/// What an operation did, as seen by a caller that survived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    Pushed,
    Full,
    Popped(i32),
    Empty,
    Resized,
    Rejected(StackError),
}

/// One scripted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstOp {
    Push(i32),
    Pop,
    Resize(usize),
}

/// Runs a stack under fault injection and keeps the bookkeeping the
/// invariant checker needs.
pub struct DstRunner<S> {
    stack: S,
    env: DstEnv,
    // Bookkeeping for invariant checks
    pushed: Vec<i32>,
    popped: Vec<i32>,
    truncated: Vec<i32>,
    history: StackHistory,
    step: u64,
    // Statistics
    operations_count: u64,
    faults_injected: u64,
    abandoned_operations: u64,
    allocation_failures: u64,
}

impl<S: DstTestableStack> DstRunner<S> {
    /// Runner with the default fault configuration.
    pub fn new(seed: u64, capacity: Capacity) -> Result<Self, StackError> {
        Self::with_fault_config(seed, capacity, FaultConfig::default())
    }

    pub fn with_fault_config(
        seed: u64,
        capacity: Capacity,
        fault_config: FaultConfig,
    ) -> Result<Self, StackError> {
        Ok(Self {
            stack: S::create(capacity)?,
            env: DstEnv::with_fault_config(seed, fault_config),
            pushed: Vec::new(),
            popped: Vec::new(),
            truncated: Vec::new(),
            history: StackHistory::new(capacity.get() as u64),
            step: 0,
            operations_count: 0,
            faults_injected: 0,
            abandoned_operations: 0,
            allocation_failures: 0,
        })
    }

    /// Seed for reproduction.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.env.seed()
    }

    /// The stack under test.
    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn env(&mut self) -> &mut DstEnv {
        &mut self.env
    }

    fn record(&mut self, thread_id: u64, op_type: StackOpType) {
        self.step += 1;
        self.history.record(thread_id, op_type, self.step);
    }

    /// Run one operation on behalf of `thread_id`.
    ///
    /// `Err(fault)` means the caller did not see a result; whether the
    /// operation was applied depends on where the fault hit.
    pub fn execute(&mut self, thread_id: u64, op: DstOp) -> Result<OpOutcome, FaultType> {
        match op {
            DstOp::Push(value) => self.push(thread_id, value),
            DstOp::Pop => self.pop(thread_id),
            DstOp::Resize(capacity) => self.resize(thread_id, capacity),
        }
    }

    /// Push with fault injection at boundaries.
    pub fn push(&mut self, thread_id: u64, value: i32) -> Result<OpOutcome, FaultType> {
        self.before_operation(false)?;

        let outcome = match self.stack.push(value) {
            Ok(()) => {
                self.pushed.push(value);
                self.record(thread_id, StackOpType::Push(value));
                OpOutcome::Pushed
            }
            Err(StackError::Full) => {
                self.record(thread_id, StackOpType::PushFull(value));
                OpOutcome::Full
            }
            Err(e) => OpOutcome::Rejected(e),
        };
        self.operations_count += 1;

        self.after_operation()?;
        Ok(outcome)
    }

    /// Pop with fault injection at boundaries.
    pub fn pop(&mut self, thread_id: u64) -> Result<OpOutcome, FaultType> {
        self.before_operation(false)?;

        let outcome = match self.stack.pop() {
            PopOutcome::Value(v) => {
                self.popped.push(v);
                self.record(thread_id, StackOpType::Pop(v));
                OpOutcome::Popped(v)
            }
            PopOutcome::Empty => {
                self.record(thread_id, StackOpType::PopEmpty);
                OpOutcome::Empty
            }
        };
        self.operations_count += 1;

        // A crash here loses the popped value from the caller's view only;
        // it stays accounted for in `popped`.
        self.after_operation()?;
        Ok(outcome)
    }

    /// Resize with fault injection at boundaries.
    pub fn resize(&mut self, thread_id: u64, new_capacity: usize) -> Result<OpOutcome, FaultType> {
        let (target, allocation_fails) = match self.before_operation(true) {
            Ok(()) => (new_capacity, false),
            Err(FaultType::AllocationFailure) => (UNALLOCATABLE_CAPACITY, true),
            Err(fault) => return Err(fault),
        };
        let outcome = self.apply_resize(thread_id, target);
        self.operations_count += 1;

        // The caller that hit an allocation failure sees it directly.
        if !allocation_fails {
            self.after_operation()?;
        }
        Ok(outcome)
    }

    fn apply_resize(&mut self, thread_id: u64, new_capacity: usize) -> OpOutcome {
        let capacity = new_capacity as u64;
        let before = self.stack.snapshot();
        match self.stack.resize(new_capacity) {
            Ok(()) => {
                if before.count() > new_capacity {
                    self.truncated
                        .extend_from_slice(&before.contents[new_capacity..]);
                }
                self.record(thread_id, StackOpType::Resize { capacity });
                OpOutcome::Resized
            }
            Err(e) => {
                self.record(thread_id, StackOpType::ResizeRejected { capacity });
                OpOutcome::Rejected(e)
            }
        }
    }

    fn before_operation(&mut self, allocates: bool) -> Result<(), FaultType> {
        match self.maybe_inject_fault(FaultPoint::BeforeOperation, allocates) {
            Some(FaultType::CallerCrash) => {
                self.abandoned_operations += 1;
                Err(FaultType::CallerCrash)
            }
            Some(FaultType::AllocationFailure) => {
                self.allocation_failures += 1;
                Err(FaultType::AllocationFailure)
            }
            Some(FaultType::Delay) | None => Ok(()),
        }
    }

    fn after_operation(&mut self) -> Result<(), FaultType> {
        match self.maybe_inject_fault(FaultPoint::AfterOperation, false) {
            Some(FaultType::CallerCrash) => {
                self.abandoned_operations += 1;
                Err(FaultType::CallerCrash)
            }
            _ => Ok(()),
        }
    }

    /// Maybe inject a fault at the given point.
    fn maybe_inject_fault(&mut self, point: FaultPoint, allocates: bool) -> Option<FaultType> {
        if !self.env.fault().should_fail() {
            self.env.maybe_delay();
            return None;
        }
        self.faults_injected += 1;

        let fault = match (point, allocates) {
            (FaultPoint::BeforeOperation, true) => self.env.fault().choose(&[
                FaultType::AllocationFailure,
                FaultType::CallerCrash,
                FaultType::Delay,
            ]),
            _ => self
                .env
                .fault()
                .choose(&[FaultType::CallerCrash, FaultType::Delay]),
        };
        if fault == FaultType::Delay {
            let delay = self.env.fault().config().delay_us_max;
            self.env.clock().advance_us(delay);
        }
        Some(fault)
    }

    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> DstStats {
        DstStats {
            seed: self.env.seed(),
            operations_count: self.operations_count,
            faults_injected: self.faults_injected,
            abandoned_operations: self.abandoned_operations,
            allocation_failures: self.allocation_failures,
        }
    }
}

impl<S: DstTestableStack> BoundedStackProperties for DstRunner<S> {
    fn pushed_elements(&self) -> Vec<i32> {
        self.pushed.clone()
    }

    fn popped_elements(&self) -> Vec<i32> {
        self.popped.clone()
    }

    fn truncated_elements(&self) -> Vec<i32> {
        self.truncated.clone()
    }

    fn current_contents(&self) -> Vec<i32> {
        self.stack.snapshot().contents
    }

    fn count(&self) -> u64 {
        self.stack.snapshot().count() as u64
    }

    fn capacity(&self) -> u64 {
        self.stack.snapshot().capacity as u64
    }

    fn history(&self) -> StackHistory {
        self.history.clone()
    }
}

/// Statistics from a DST run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstStats {
    pub seed: u64,
    pub operations_count: u64,
    pub faults_injected: u64,
    pub abandoned_operations: u64,
    pub allocation_failures: u64,
}

impl DstStats {
    pub fn format(&self) -> String {
        format!(
            "DST_SEED={} ops={} faults={} abandoned={} alloc_failures={}",
            self.seed,
            self.operations_count,
            self.faults_injected,
            self.abandoned_operations,
            self.allocation_failures
        )
    }
}

/// Run a scripted scenario with fault injection, then check every invariant.
pub fn run_dst_scenario<S: DstTestableStack>(
    seed: u64,
    capacity: Capacity,
    operations: &[DstOp],
) -> Result<DstResult, StackError> {
    use istack_core::{BoundedStackPropertyChecker, PropertyChecker};

    let mut runner: DstRunner<S> = DstRunner::new(seed, capacity)?;
    let mut fault_errors = Vec::new();

    for (i, op) in operations.iter().enumerate() {
        // Faults are part of the test; record and keep going.
        if let Err(fault) = runner.execute(i as u64, *op) {
            fault_errors.push(format!("{:?} during {:?}", fault, op));
        }
    }

    let mut checker = BoundedStackPropertyChecker::new(&runner);
    if seed != 0 {
        checker = checker.with_seed(seed);
    }
    let violations: Vec<String> = checker
        .check_all()
        .into_iter()
        .filter(|r| !r.holds)
        .map(|r| r.to_string())
        .collect();

    Ok(DstResult {
        passed: violations.is_empty(),
        violations,
        stats: runner.stats(),
        fault_errors,
    })
}

/// Outcome of [`run_dst_scenario`].
#[derive(Debug)]
pub struct DstResult {
    pub passed: bool,
    pub violations: Vec<String>,
    pub stats: DstStats,
    pub fault_errors: Vec<String>,
}

impl DstResult {
    pub fn format(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let mut result = format!("[{}] {}", status, self.stats.format());
        for violation in &self.violations {
            result.push_str("\n  VIOLATION: ");
            result.push_str(violation);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use istack_core::{BoundedStackPropertyChecker, PropertyChecker};

    fn capacity(n: usize) -> Capacity {
        Capacity::new(n).unwrap()
    }

    fn mixed_ops(n: usize) -> Vec<DstOp> {
        (0..n)
            .map(|i| match i % 6 {
                0 | 2 | 4 => DstOp::Push(i as i32),
                1 | 3 => DstOp::Pop,
                _ => DstOp::Resize(1 + i % 5),
            })
            .collect()
    }

    #[test]
    fn test_runner_without_faults_matches_stack() {
        let mut runner: DstRunner<BoundedStack> =
            DstRunner::with_fault_config(7, capacity(2), FaultConfig::none()).unwrap();

        assert_eq!(runner.push(0, 1), Ok(OpOutcome::Pushed));
        assert_eq!(runner.push(0, 2), Ok(OpOutcome::Pushed));
        assert_eq!(runner.push(0, 3), Ok(OpOutcome::Full));
        assert_eq!(runner.resize(0, 1), Ok(OpOutcome::Resized));
        assert_eq!(runner.pop(0), Ok(OpOutcome::Popped(1)));
        assert_eq!(runner.pop(0), Ok(OpOutcome::Empty));
        assert!(matches!(
            runner.resize(0, 0),
            Ok(OpOutcome::Rejected(StackError::InvalidArgument(_)))
        ));

        assert_eq!(runner.truncated_elements(), vec![2]);
        assert_eq!(runner.stats().faults_injected, 0);
        assert!(BoundedStackPropertyChecker::new(&runner).all_hold());
    }

    #[test]
    fn test_allocation_failure_leaves_stack_untouched() {
        let config = FaultConfig {
            failure_probability: 1.0,
            ..FaultConfig::default()
        };
        let mut runner: DstRunner<BoundedStack> =
            DstRunner::with_fault_config(3, capacity(4), config).unwrap();

        let mut saw_allocation_failure = false;
        for i in 0..200 {
            let _ = runner.push(0, i as i32);
            let before = runner.stack().snapshot();
            if let Ok(OpOutcome::Rejected(StackError::OutOfResources { requested })) =
                runner.resize(0, 1 + i % 3)
            {
                assert_eq!(requested, UNALLOCATABLE_CAPACITY);
                assert_eq!(runner.stack().snapshot(), before);
                saw_allocation_failure = true;
            }
        }
        assert!(saw_allocation_failure);
        assert!(runner.stats().allocation_failures > 0);
        assert!(BoundedStackPropertyChecker::new(&runner).all_hold());
    }

    #[test]
    fn test_allocation_failure_reaches_the_stack() {
        let config = FaultConfig {
            failure_probability: 1.0,
            ..FaultConfig::default()
        };
        let mut runner: DstRunner<BoundedStack> =
            DstRunner::with_fault_config(11, capacity(4), config).unwrap();

        let mut rejected = 0;
        for _ in 0..100 {
            if let Ok(OpOutcome::Rejected(StackError::OutOfResources { .. })) = runner.resize(0, 4) {
                rejected += 1;
            }
        }
        assert_eq!(rejected, runner.stats().allocation_failures);
        let unallocatable = UNALLOCATABLE_CAPACITY as u64;
        let recorded = runner
            .history()
            .operations
            .iter()
            .filter(|op| op.op_type == StackOpType::ResizeRejected { capacity: unallocatable })
            .count() as u64;
        assert!(recorded > 0);
        assert_eq!(recorded, rejected);
        assert_eq!(runner.stack().snapshot().capacity, 4);
    }

    #[test]
    fn test_scenario_passes_under_faults() {
        for seed in [1, 42, 12345, 0xDEAD_BEEF] {
            let result =
                run_dst_scenario::<BoundedStack>(seed, capacity(4), &mixed_ops(300)).unwrap();
            assert!(result.passed, "DST failed: {}", result.format());
        }
    }

    #[test]
    fn test_determinism() {
        let ops = mixed_ops(200);
        let a = run_dst_scenario::<BoundedStack>(42, capacity(3), &ops).unwrap();
        let b = run_dst_scenario::<BoundedStack>(42, capacity(3), &ops).unwrap();

        assert_eq!(a.stats, b.stats);
        assert_eq!(a.fault_errors, b.fault_errors);
    }

    #[test]
    fn test_crash_after_pop_keeps_accounting() {
        let config = FaultConfig {
            failure_probability: 1.0,
            ..FaultConfig::default()
        };
        let mut runner: DstRunner<BoundedStack> =
            DstRunner::with_fault_config(99, capacity(64), config).unwrap();
        for i in 0..100 {
            let _ = runner.execute(i, if i % 2 == 0 { DstOp::Push(i as i32) } else { DstOp::Pop });
        }
        assert!(runner.stats().abandoned_operations > 0);
        assert!(BoundedStackPropertyChecker::new(&runner).all_hold());
    }
}
