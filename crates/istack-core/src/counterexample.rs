//! Counterexample representation and rendering.
//!
//! When a stack invariant is violated, a counterexample shows the
//! sequence of operations and states that led to the failure.

use std::fmt;

/// A counterexample showing the failure path.
///
/// Contains the state snapshots and per-thread operations that led to
/// an invariant violation. Renders as a thread diagram.
#[derive(Debug, Clone)]
pub struct Counterexample {
    /// Sequence of state snapshots
    pub states: Vec<StateSnapshot>,
    /// Thread interleaving that caused the failure
    pub interleaving: Vec<ThreadAction>,
    /// Structural violations observed in the container
    pub violations: Vec<StateViolation>,
    /// DST seed for reproduction (if applicable)
    pub dst_seed: Option<u64>,
    /// Human-readable description of the failure
    pub description: Option<String>,
}

/// Snapshot of stack state at a point in time.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Step number in the execution
    pub step: u64,
    /// Description of the state
    pub description: String,
    /// Variable values at this point
    pub variables: Vec<(String, String)>,
}

/// Operation performed by a caller thread.
#[derive(Debug, Clone)]
pub struct ThreadAction {
    /// Thread identifier
    pub thread_id: u64,
    /// Step number when this action occurred
    pub step: u64,
    /// Description of the action, e.g. `push(7)` or `resize(3)`
    pub action: String,
    /// Whether the operation succeeded
    pub success: bool,
}

/// Structural violation of the container's quiescent-state invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateViolation {
    /// More live elements than the capacity allows
    CountExceedsCapacity { count: u64, capacity: u64, step: u64 },
    /// Capacity observed as zero
    ZeroCapacity { step: u64 },
    /// Capacity and contents disagree about which resize was applied
    TornResize {
        observed_capacity: u64,
        expected_capacity: u64,
        step: u64,
    },
    /// A pushed element vanished without a pop or a truncating resize
    LostElement { value: i32, step: u64 },
}

impl Counterexample {
    /// Create a new empty counterexample.
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            interleaving: Vec::new(),
            violations: Vec::new(),
            dst_seed: None,
            description: None,
        }
    }

    /// Create a counterexample with DST seed for reproduction.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        Self {
            dst_seed: Some(seed),
            ..Self::new()
        }
    }

    /// Set the description for this counterexample.
    #[must_use]
    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Add a state snapshot. Steps must be strictly increasing.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(
            self.states.last().map_or(true, |last| state.step > last.step),
            "States must be added in order"
        );
        self.states.push(state);
    }

    /// Add a thread action.
    pub fn add_action(&mut self, action: ThreadAction) {
        self.interleaving.push(action);
    }

    /// Add a structural violation.
    pub fn add_violation(&mut self, violation: StateViolation) {
        self.violations.push(violation);
    }

    /// Render the counterexample as a human-readable thread diagram.
    ///
    /// ```text
    /// DST_SEED=12345
    ///
    /// Step | Thread 0 | Thread 1 | State
    /// -----|----------|----------|------
    ///    1 | push(4)  |          | count=1 capacity=2
    ///    2 |          | resize(1) | count=1 capacity=1
    /// ```
    #[must_use]
    pub fn render_diagram(&self) -> String {
        let mut output = String::new();

        if let Some(seed) = self.dst_seed {
            output.push_str(&format!("DST_SEED={}\n\n", seed));
        }

        if let Some(ref desc) = self.description {
            output.push_str("Failure: ");
            output.push_str(desc);
            output.push_str("\n\n");
        }

        let mut threads: Vec<u64> = self.interleaving.iter().map(|a| a.thread_id).collect();
        threads.sort_unstable();
        threads.dedup();

        if threads.is_empty() {
            output.push_str("(no thread actions recorded)\n");
        } else {
            output.push_str("Step |");
            for tid in &threads {
                output.push_str(&format!(" Thread {} |", tid));
            }
            output.push_str(" State\n");

            output.push_str("-----|");
            for _ in &threads {
                output.push_str("----------|");
            }
            output.push_str("------\n");

            let max_step = self.interleaving.iter().map(|a| a.step).max().unwrap_or(0);

            for step in 1..=max_step {
                output.push_str(&format!("{:4} |", step));

                for tid in &threads {
                    let action = self
                        .interleaving
                        .iter()
                        .find(|a| a.step == step && a.thread_id == *tid);

                    match action {
                        Some(a) => {
                            let status = if a.success { "" } else { " [FAIL]" };
                            output.push_str(&format!(" {}{} |", a.action, status));
                        }
                        None => output.push_str("          |"),
                    }
                }

                if let Some(state) = self.states.iter().find(|s| s.step == step) {
                    output.push_str(&format!(" {}", state.description));
                }

                output.push('\n');
            }
        }

        if !self.violations.is_empty() {
            output.push_str("\nViolations:\n");
            for violation in &self.violations {
                output.push_str(&format!("  - {}\n", violation));
            }
        }

        output
    }
}

impl Default for Counterexample {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateViolation::CountExceedsCapacity {
                count,
                capacity,
                step,
            } => write!(
                f,
                "count {} exceeds capacity {} at step {}",
                count, capacity, step
            ),
            StateViolation::ZeroCapacity { step } => {
                write!(f, "capacity observed as zero at step {}", step)
            }
            StateViolation::TornResize {
                observed_capacity,
                expected_capacity,
                step,
            } => write!(
                f,
                "torn resize: capacity {} but contents match capacity {} at step {}",
                observed_capacity, expected_capacity, step
            ),
            StateViolation::LostElement { value, step } => write!(
                f,
                "element {} lost without pop or truncation at step {}",
                value, step
            ),
        }
    }
}
