//! Invariants of the lock-guarded bounded stack.
//!
//! | Property | Description |
//! |----------|-------------|
//! | CountWithinCapacity | `count <= capacity` and contents length equals count |
//! | CapacityPositive | capacity never observed as zero |
//! | NoLostElements | every push is in the stack, popped, or truncated by a resize |
//! | NoDuplicates | no value is observed more often than it was pushed |
//! | LifoOrder | every pop returns the top of the replayed model stack |
//! | FullRejection | a push is rejected exactly when the model stack is full |
//! | HistoryMatchesState | replaying the history reproduces contents and capacity |
//!
//! Values are plain integers and may repeat, so element accounting is done
//! on multisets rather than sets.

use std::collections::HashMap;

use crate::counterexample::{Counterexample, StateSnapshot, StateViolation, ThreadAction};
use crate::property::{PropertyChecker, PropertyResult};

/// State a bounded stack implementation exposes for checking.
///
/// All values are copies; nothing here borrows the container's storage.
pub trait BoundedStackProperties {
    /// Every value accepted by push, in acceptance order.
    fn pushed_elements(&self) -> Vec<i32>;

    /// Every value returned by pop, in return order.
    fn popped_elements(&self) -> Vec<i32>;

    /// Every value discarded by a shrinking resize.
    fn truncated_elements(&self) -> Vec<i32>;

    /// Current contents, bottom to top.
    fn current_contents(&self) -> Vec<i32>;

    /// Current number of live elements.
    fn count(&self) -> u64;

    /// Current capacity.
    fn capacity(&self) -> u64;

    /// Operation history in linearization order.
    /// Returns owned data to avoid lifetime issues with internal mutexes.
    fn history(&self) -> StackHistory;
}

/// History of stack operations in linearization order.
#[derive(Debug, Clone)]
pub struct StackHistory {
    /// Capacity the stack was created with
    pub initial_capacity: u64,
    /// Sequence of operations in linearization order
    pub operations: Vec<StackOperation>,
}

/// A single recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOperation {
    /// Thread that performed the operation
    pub thread_id: u64,
    /// What happened
    pub op_type: StackOpType,
    /// Step number for ordering
    pub step: u64,
}

/// Kind and outcome of a recorded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOpType {
    /// Push accepted
    Push(i32),
    /// Push rejected because the stack was full
    PushFull(i32),
    /// Pop returned a value
    Pop(i32),
    /// Pop found the stack empty
    PopEmpty,
    /// Resize applied
    Resize { capacity: u64 },
    /// Resize refused (invalid argument or allocation failure), nothing changed
    ResizeRejected { capacity: u64 },
}

impl StackOpType {
    fn describe(&self) -> String {
        match self {
            StackOpType::Push(v) => format!("push({})", v),
            StackOpType::PushFull(v) => format!("push({}) full", v),
            StackOpType::Pop(v) => format!("pop={}", v),
            StackOpType::PopEmpty => "pop=empty".to_string(),
            StackOpType::Resize { capacity } => format!("resize({})", capacity),
            StackOpType::ResizeRejected { capacity } => format!("resize({}) rejected", capacity),
        }
    }

    fn succeeded(&self) -> bool {
        !matches!(
            self,
            StackOpType::PushFull(_) | StackOpType::ResizeRejected { .. }
        )
    }
}

impl StackHistory {
    /// Create an empty history for a stack of the given initial capacity.
    #[must_use]
    pub fn new(initial_capacity: u64) -> Self {
        debug_assert!(initial_capacity > 0, "Capacity must be positive");
        Self {
            initial_capacity,
            operations: Vec::new(),
        }
    }

    /// Record an operation. Steps must be positive.
    pub fn record(&mut self, thread_id: u64, op_type: StackOpType, step: u64) {
        debug_assert!(step > 0, "Step must be positive");
        self.operations.push(StackOperation {
            thread_id,
            op_type,
            step,
        });
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Build a counterexample from the operations up to and including `step`.
    #[must_use]
    pub fn counterexample_until(&self, step: u64, seed: Option<u64>) -> Counterexample {
        let mut ce = match seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        };
        for op in self.operations.iter().filter(|op| op.step <= step) {
            ce.add_action(ThreadAction {
                thread_id: op.thread_id,
                step: op.step,
                action: op.op_type.describe(),
                success: op.op_type.succeeded(),
            });
        }
        ce
    }
}

/// Sequential reference model used to replay a history.
#[derive(Debug, Clone)]
struct ReplayModel {
    contents: Vec<i32>,
    capacity: u64,
}

/// Why a replay step disagreed with the recorded outcome.
#[derive(Debug)]
enum ReplayError {
    Lifo(String),
    Full(String),
}

impl ReplayModel {
    fn new(capacity: u64) -> Self {
        Self {
            contents: Vec::new(),
            capacity,
        }
    }

    fn is_full(&self) -> bool {
        self.contents.len() as u64 >= self.capacity
    }

    fn apply(&mut self, op: &StackOperation) -> Result<(), ReplayError> {
        match op.op_type {
            StackOpType::Push(v) => {
                if self.is_full() {
                    return Err(ReplayError::Full(format!(
                        "push({}) accepted with {} of {} slots used (step {})",
                        v,
                        self.contents.len(),
                        self.capacity,
                        op.step
                    )));
                }
                self.contents.push(v);
            }
            StackOpType::PushFull(v) => {
                if !self.is_full() {
                    return Err(ReplayError::Full(format!(
                        "push({}) rejected with {} of {} slots used (step {})",
                        v,
                        self.contents.len(),
                        self.capacity,
                        op.step
                    )));
                }
            }
            StackOpType::Pop(expected) => match self.contents.pop() {
                Some(actual) if actual != expected => {
                    return Err(ReplayError::Lifo(format!(
                        "pop returned {} but model top was {} (step {})",
                        expected, actual, op.step
                    )));
                }
                None => {
                    return Err(ReplayError::Lifo(format!(
                        "pop returned {} but model stack was empty (step {})",
                        expected, op.step
                    )));
                }
                Some(_) => {}
            },
            StackOpType::PopEmpty => {
                if !self.contents.is_empty() {
                    return Err(ReplayError::Lifo(format!(
                        "pop reported empty but model has {} elements (step {})",
                        self.contents.len(),
                        op.step
                    )));
                }
            }
            StackOpType::Resize { capacity } => {
                self.contents.truncate(capacity as usize);
                self.capacity = capacity;
            }
            StackOpType::ResizeRejected { .. } => {}
        }
        Ok(())
    }
}

fn multiset(values: impl IntoIterator<Item = i32>) -> HashMap<i32, u64> {
    let mut counts = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
}

/// Property checker for bounded stack implementations.
pub struct BoundedStackPropertyChecker<'a, T: BoundedStackProperties> {
    stack: &'a T,
    dst_seed: Option<u64>,
}

impl<'a, T: BoundedStackProperties> BoundedStackPropertyChecker<'a, T> {
    /// Create a new checker for the given stack.
    #[must_use]
    pub fn new(stack: &'a T) -> Self {
        Self {
            stack,
            dst_seed: None,
        }
    }

    /// Set DST seed for counterexample reproduction.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        self.dst_seed = Some(seed);
        self
    }

    fn snapshot(&self, step: u64, description: String) -> StateSnapshot {
        StateSnapshot {
            step,
            description,
            variables: vec![
                ("count".to_string(), self.stack.count().to_string()),
                ("capacity".to_string(), self.stack.capacity().to_string()),
                (
                    "contents".to_string(),
                    format!("{:?}", self.stack.current_contents()),
                ),
            ],
        }
    }

    fn check_count_within_capacity(&self) -> PropertyResult {
        let count = self.stack.count();
        let capacity = self.stack.capacity();
        let contents_len = self.stack.current_contents().len() as u64;

        if count > capacity {
            let mut ce = self.counterexample_at_end();
            ce.add_violation(StateViolation::CountExceedsCapacity {
                count,
                capacity,
                step: self.last_step(),
            });
            return PropertyResult::fail(
                "CountWithinCapacity",
                format!("count {} exceeds capacity {}", count, capacity),
                Some(ce),
            );
        }
        if contents_len != count {
            return PropertyResult::fail(
                "CountWithinCapacity",
                format!("count is {} but {} live elements observed", count, contents_len),
                None,
            );
        }

        PropertyResult::pass("CountWithinCapacity")
    }

    fn check_capacity_positive(&self) -> PropertyResult {
        if self.stack.capacity() == 0 {
            let mut ce = self.counterexample_at_end();
            ce.add_violation(StateViolation::ZeroCapacity {
                step: self.last_step(),
            });
            return PropertyResult::fail(
                "CapacityPositive",
                "capacity observed as zero".to_string(),
                Some(ce),
            );
        }
        PropertyResult::pass("CapacityPositive")
    }

    /// Every accepted push is accounted for by exactly one of: still in the
    /// stack, popped, or discarded by a truncating resize.
    fn check_no_lost_elements(&self) -> PropertyResult {
        let pushed = multiset(self.stack.pushed_elements());
        let accounted = multiset(
            self.stack
                .current_contents()
                .into_iter()
                .chain(self.stack.popped_elements())
                .chain(self.stack.truncated_elements()),
        );

        for (value, &times) in &pushed {
            let seen = accounted.get(value).copied().unwrap_or(0);
            if seen < times {
                let step = self.last_step();
                let mut ce = self.counterexample_at_end();
                ce.add_state(self.snapshot(step + 1, format!("Element {} lost", value)));
                ce.add_violation(StateViolation::LostElement {
                    value: *value,
                    step,
                });
                return PropertyResult::fail(
                    "NoLostElements",
                    format!(
                        "element {} pushed {} times but only {} accounted for",
                        value, times, seen
                    ),
                    Some(ce),
                );
            }
        }

        PropertyResult::pass("NoLostElements")
    }

    fn check_no_duplicates(&self) -> PropertyResult {
        let pushed = multiset(self.stack.pushed_elements());
        let accounted = multiset(
            self.stack
                .current_contents()
                .into_iter()
                .chain(self.stack.popped_elements())
                .chain(self.stack.truncated_elements()),
        );

        for (value, &seen) in &accounted {
            let times = pushed.get(value).copied().unwrap_or(0);
            if seen > times {
                return PropertyResult::fail(
                    "NoDuplicates",
                    format!(
                        "element {} observed {} times but pushed only {} times",
                        value, seen, times
                    ),
                    None,
                );
            }
        }

        PropertyResult::pass("NoDuplicates")
    }

    /// Replays the history against the sequential model; reports the first
    /// disagreement of the requested kind.
    fn replay(&self) -> (ReplayModel, Option<(u64, ReplayError)>) {
        let history = self.stack.history();
        let mut model = ReplayModel::new(history.initial_capacity);
        for op in &history.operations {
            if let Err(e) = model.apply(op) {
                return (model, Some((op.step, e)));
            }
        }
        (model, None)
    }

    fn check_lifo_order(&self) -> PropertyResult {
        match self.replay() {
            (_, Some((step, ReplayError::Lifo(msg)))) => PropertyResult::fail(
                "LifoOrder",
                msg,
                Some(self.stack.history().counterexample_until(step, self.dst_seed)),
            ),
            _ => PropertyResult::pass("LifoOrder"),
        }
    }

    fn check_full_rejection(&self) -> PropertyResult {
        match self.replay() {
            (_, Some((step, ReplayError::Full(msg)))) => PropertyResult::fail(
                "FullRejection",
                msg,
                Some(self.stack.history().counterexample_until(step, self.dst_seed)),
            ),
            _ => PropertyResult::pass("FullRejection"),
        }
    }

    /// A torn resize shows up here: capacity from one resize paired with
    /// contents from another.
    fn check_history_matches_state(&self) -> PropertyResult {
        let (model, error) = self.replay();
        if error.is_some() {
            // Already reported by LifoOrder / FullRejection.
            return PropertyResult::pass("HistoryMatchesState");
        }

        let capacity = self.stack.capacity();
        let contents = self.stack.current_contents();

        if model.capacity != capacity {
            let mut ce = self.counterexample_at_end();
            ce.add_violation(StateViolation::TornResize {
                observed_capacity: capacity,
                expected_capacity: model.capacity,
                step: self.last_step(),
            });
            return PropertyResult::fail(
                "HistoryMatchesState",
                format!(
                    "capacity is {} but history implies {}",
                    capacity, model.capacity
                ),
                Some(ce),
            );
        }
        if model.contents != contents {
            return PropertyResult::fail(
                "HistoryMatchesState",
                format!(
                    "contents are {:?} but history implies {:?}",
                    contents, model.contents
                ),
                Some(self.counterexample_at_end()),
            );
        }

        PropertyResult::pass("HistoryMatchesState")
    }

    fn last_step(&self) -> u64 {
        self.stack
            .history()
            .operations
            .last()
            .map_or(0, |op| op.step)
    }

    fn counterexample_at_end(&self) -> Counterexample {
        self.stack
            .history()
            .counterexample_until(u64::MAX, self.dst_seed)
    }
}

impl<T: BoundedStackProperties> PropertyChecker for BoundedStackPropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_count_within_capacity(),
            self.check_capacity_positive(),
            self.check_no_lost_elements(),
            self.check_no_duplicates(),
            self.check_lifo_order(),
            self.check_full_rejection(),
            self.check_history_matches_state(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sequential reference implementation with full bookkeeping.
    struct TestStack {
        contents: Vec<i32>,
        capacity: u64,
        pushed: Vec<i32>,
        popped: Vec<i32>,
        truncated: Vec<i32>,
        history: StackHistory,
    }

    impl TestStack {
        fn new(capacity: u64) -> Self {
            Self {
                contents: Vec::new(),
                capacity,
                pushed: Vec::new(),
                popped: Vec::new(),
                truncated: Vec::new(),
                history: StackHistory::new(capacity),
            }
        }

        fn step(&self) -> u64 {
            self.history.len() as u64 + 1
        }

        fn push(&mut self, v: i32) {
            let step = self.step();
            if self.contents.len() as u64 == self.capacity {
                self.history.record(0, StackOpType::PushFull(v), step);
            } else {
                self.contents.push(v);
                self.pushed.push(v);
                self.history.record(0, StackOpType::Push(v), step);
            }
        }

        fn pop(&mut self) -> Option<i32> {
            let step = self.step();
            let v = self.contents.pop();
            match v {
                Some(v) => {
                    self.popped.push(v);
                    self.history.record(0, StackOpType::Pop(v), step);
                }
                None => self.history.record(0, StackOpType::PopEmpty, step),
            }
            v
        }

        fn resize(&mut self, capacity: u64) {
            let step = self.step();
            if self.contents.len() as u64 > capacity {
                self.truncated
                    .extend(self.contents.drain(capacity as usize..));
            }
            self.capacity = capacity;
            self.history
                .record(0, StackOpType::Resize { capacity }, step);
        }
    }

    impl BoundedStackProperties for TestStack {
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
            self.contents.clone()
        }

        fn count(&self) -> u64 {
            self.contents.len() as u64
        }

        fn capacity(&self) -> u64 {
            self.capacity
        }

        fn history(&self) -> StackHistory {
            self.history.clone()
        }
    }

    fn find<'r>(results: &'r [PropertyResult], name: &str) -> &'r PropertyResult {
        results.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_correct_stack_passes_all() {
        let mut stack = TestStack::new(3);
        stack.push(1);
        stack.push(2);
        stack.push(3);
        stack.push(4);
        stack.pop();
        stack.resize(1);
        stack.pop();
        stack.pop();
        stack.push(7);

        let checker = BoundedStackPropertyChecker::new(&stack);
        for result in checker.check_all() {
            assert!(result.holds, "{}", result);
        }
    }

    #[test]
    fn test_repeated_values_are_fine() {
        let mut stack = TestStack::new(4);
        stack.push(5);
        stack.push(5);
        stack.push(5);
        stack.pop();

        let checker = BoundedStackPropertyChecker::new(&stack);
        assert!(checker.all_hold());
    }

    #[test]
    fn test_lost_element_detected() {
        let mut stack = TestStack::new(4);
        stack.push(1);
        stack.push(2);
        stack.push(3);
        // Element 3 disappears without a pop or resize.
        stack.contents.pop();

        let checker = BoundedStackPropertyChecker::new(&stack).with_seed(99);
        let results = checker.check_all();

        let no_lost = find(&results, "NoLostElements");
        assert!(!no_lost.holds);
        assert!(no_lost.violation.as_ref().unwrap().contains("3"));
        let ce = no_lost.counterexample.as_ref().unwrap();
        assert_eq!(ce.dst_seed, Some(99));
        assert!(ce.render_diagram().contains("push(3)"));
    }

    #[test]
    fn test_duplicate_detected() {
        let mut stack = TestStack::new(4);
        stack.push(1);
        stack.push(2);
        stack.contents.push(2);

        let results = BoundedStackPropertyChecker::new(&stack).check_all();
        assert!(!find(&results, "NoDuplicates").holds);
    }

    #[test]
    fn test_lifo_violation_detected() {
        let mut stack = TestStack::new(4);
        stack.push(1);
        stack.push(2);
        stack.contents.swap(0, 1);
        stack.pop();

        let results = BoundedStackPropertyChecker::new(&stack).check_all();
        let lifo = find(&results, "LifoOrder");
        assert!(!lifo.holds);
        assert!(lifo.violation.as_ref().unwrap().contains("model top was 2"));
    }

    #[test]
    fn test_push_beyond_capacity_detected() {
        let mut stack = TestStack::new(1);
        stack.push(1);
        // Bypass the capacity check.
        stack.contents.push(2);
        stack.pushed.push(2);
        let step = stack.step();
        stack.history.record(0, StackOpType::Push(2), step);

        let results = BoundedStackPropertyChecker::new(&stack).check_all();
        assert!(!find(&results, "CountWithinCapacity").holds);
        assert!(!find(&results, "FullRejection").holds);
    }

    #[test]
    fn test_spurious_full_rejection_detected() {
        let mut stack = TestStack::new(4);
        stack.push(1);
        stack.history.record(0, StackOpType::PushFull(2), 2);

        let results = BoundedStackPropertyChecker::new(&stack).check_all();
        let full = find(&results, "FullRejection");
        assert!(!full.holds);
        assert!(full.violation.as_ref().unwrap().contains("rejected"));
    }

    #[test]
    fn test_torn_resize_detected() {
        let mut stack = TestStack::new(4);
        stack.push(1);
        stack.resize(8);
        // Capacity reverted while the history says the resize applied.
        stack.capacity = 4;

        let results = BoundedStackPropertyChecker::new(&stack).check_all();
        let state = find(&results, "HistoryMatchesState");
        assert!(!state.holds);
        let ce = state.counterexample.as_ref().unwrap();
        assert!(matches!(
            ce.violations[0],
            StateViolation::TornResize {
                observed_capacity: 4,
                expected_capacity: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_capacity_detected() {
        let mut stack = TestStack::new(2);
        stack.capacity = 0;

        let results = BoundedStackPropertyChecker::new(&stack).check_all();
        assert!(!find(&results, "CapacityPositive").holds);
    }
}
