//! Verifies implementations against the sequential stack model.
//!
//! Every operation sequence up to a bounded length, over a small alphabet
//! of pushes, pops and resizes, is run against the implementation and a
//! reference model side by side. Each outcome and the resulting
//! contents and capacity must match after every step.

use istack::{BoundedStack, Capacity, PopOutcome, StackError};

/// What the verifier needs from an implementation.
pub trait VerifiableStack {
    /// Create an empty stack.
    fn create(capacity: Capacity) -> Result<Self, StackError>
    where
        Self: Sized;

    fn push(&self, value: i32) -> Result<(), StackError>;

    fn pop(&self) -> PopOutcome;

    fn resize(&self, new_capacity: usize) -> Result<(), StackError>;

    /// Current contents, bottom to top.
    fn contents(&self) -> Vec<i32>;

    fn capacity(&self) -> usize;
}

impl VerifiableStack for BoundedStack {
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

    fn contents(&self) -> Vec<i32> {
        self.snapshot().contents
    }

    fn capacity(&self) -> usize {
        BoundedStack::capacity(self)
    }
}

/// Operation applied by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOp {
    Push(i32),
    Pop,
    Resize(usize),
}

/// Observable result of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Pushed,
    Full,
    Popped(i32),
    Empty,
    Resized,
    InvalidArgument,
    Other(String),
}

/// Sequential reference.
#[derive(Debug, Clone)]
struct Reference {
    contents: Vec<i32>,
    capacity: usize,
}

impl Reference {
    fn apply(&mut self, op: VerifyOp) -> Outcome {
        match op {
            VerifyOp::Push(v) => {
                if self.contents.len() >= self.capacity {
                    Outcome::Full
                } else {
                    self.contents.push(v);
                    Outcome::Pushed
                }
            }
            VerifyOp::Pop => self.contents.pop().map_or(Outcome::Empty, Outcome::Popped),
            VerifyOp::Resize(0) => Outcome::InvalidArgument,
            VerifyOp::Resize(c) => {
                self.contents.truncate(c);
                self.capacity = c;
                Outcome::Resized
            }
        }
    }
}

fn apply<S: VerifiableStack>(stack: &S, op: VerifyOp) -> Outcome {
    let classify = |e: StackError| match e {
        StackError::Full => Outcome::Full,
        StackError::InvalidArgument(_) => Outcome::InvalidArgument,
        other => Outcome::Other(other.to_string()),
    };
    match op {
        VerifyOp::Push(v) => stack.push(v).map_or_else(classify, |()| Outcome::Pushed),
        VerifyOp::Pop => match stack.pop() {
            PopOutcome::Value(v) => Outcome::Popped(v),
            PopOutcome::Empty => Outcome::Empty,
        },
        VerifyOp::Resize(c) => stack.resize(c).map_or_else(classify, |()| Outcome::Resized),
    }
}

/// Configuration for verification.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Longest operation sequence enumerated
    pub sequence_len_max: usize,
    /// Initial capacities to start from
    pub initial_capacities: Vec<usize>,
    /// Capacities resize is called with (0 exercises rejection)
    pub resize_targets: Vec<usize>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            sequence_len_max: 5,
            initial_capacities: vec![1, 2],
            resize_targets: vec![0, 1, 3],
        }
    }
}

impl VerifierConfig {
    /// Quick verification.
    pub fn quick() -> Self {
        Self {
            sequence_len_max: 4,
            initial_capacities: vec![2],
            resize_targets: vec![0, 1],
        }
    }

    /// Thorough verification.
    pub fn thorough() -> Self {
        Self {
            sequence_len_max: 6,
            initial_capacities: vec![1, 2, 3],
            resize_targets: vec![0, 1, 2, 4],
        }
    }

    /// Alphabet of operations; push values are fresh per position.
    fn alphabet(&self, position: usize) -> Vec<VerifyOp> {
        let mut ops = vec![VerifyOp::Push(position as i32 + 1), VerifyOp::Pop];
        ops.extend(self.resize_targets.iter().map(|&c| VerifyOp::Resize(c)));
        ops
    }
}

/// Result of verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub passed: bool,
    /// Sequences executed
    pub sequences_count: usize,
    /// Operations executed
    pub operations_count: usize,
    /// Error message if verification failed
    pub error: Option<String>,
}

/// Run every bounded sequence against a fresh `S` and the reference.
pub fn verify_implementation<S: VerifiableStack>(config: &VerifierConfig) -> VerificationResult {
    let mut result = VerificationResult {
        passed: true,
        sequences_count: 0,
        operations_count: 0,
        error: None,
    };

    for &initial in &config.initial_capacities {
        let mut prefix = Vec::new();
        if let Err(e) = explore::<S>(config, initial, &mut prefix, &mut result) {
            result.passed = false;
            result.error = Some(e);
            return result;
        }
    }
    result
}

fn explore<S: VerifiableStack>(
    config: &VerifierConfig,
    initial: usize,
    prefix: &mut Vec<VerifyOp>,
    result: &mut VerificationResult,
) -> Result<(), String> {
    if !prefix.is_empty() {
        run_sequence::<S>(initial, prefix, result)?;
    }
    if prefix.len() == config.sequence_len_max {
        return Ok(());
    }
    for op in config.alphabet(prefix.len()) {
        prefix.push(op);
        explore::<S>(config, initial, prefix, result)?;
        prefix.pop();
    }
    Ok(())
}

fn run_sequence<S: VerifiableStack>(
    initial: usize,
    ops: &[VerifyOp],
    result: &mut VerificationResult,
) -> Result<(), String> {
    let capacity = Capacity::new(initial).map_err(|e| e.to_string())?;
    let stack = S::create(capacity).map_err(|e| e.to_string())?;
    let mut reference = Reference {
        contents: Vec::new(),
        capacity: initial,
    };
    result.sequences_count += 1;

    for (i, &op) in ops.iter().enumerate() {
        let expected = reference.apply(op);
        let actual = apply(&stack, op);
        result.operations_count += 1;

        let context = || format!("capacity {} ops {:?}, step {}", initial, &ops[..=i], i);
        if actual != expected {
            return Err(format!(
                "{}: expected {:?}, got {:?}",
                context(),
                expected,
                actual
            ));
        }
        if stack.contents() != reference.contents {
            return Err(format!(
                "{}: contents {:?}, expected {:?}",
                context(),
                stack.contents(),
                reference.contents
            ));
        }
        if stack.capacity() != reference.capacity {
            return Err(format!(
                "{}: capacity {}, expected {}",
                context(),
                stack.capacity(),
                reference.capacity
            ));
        }
    }
    Ok(())
}
