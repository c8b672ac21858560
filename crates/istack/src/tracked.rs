//! A [`BoundedStack`] that records its history for invariant checking.
//!
//! Each tracked operation holds the tracker lock across the stack call, so
//! the recorded order is the order the stack applied the operations in.
//! This serializes tracked callers; use the bare stack to measure
//! contention.

use std::sync::{Mutex, MutexGuard};

use istack_core::invariants::{BoundedStackProperties, StackHistory, StackOpType};

use crate::error::StackError;
use crate::stack::{BoundedStack, Capacity, PopOutcome};

struct Tracker {
    pushed: Vec<i32>,
    popped: Vec<i32>,
    truncated: Vec<i32>,
    history: StackHistory,
    step: u64,
}

impl Tracker {
    fn record(&mut self, thread_id: u64, op_type: StackOpType) {
        self.step += 1;
        let step = self.step;
        self.history.record(thread_id, op_type, step);
    }
}

/// Bounded stack with pushed / popped / truncated bookkeeping.
pub struct TrackedStack {
    stack: BoundedStack,
    tracker: Mutex<Tracker>,
}

impl TrackedStack {
    /// Create an empty tracked stack.
    pub fn new(capacity: Capacity) -> Result<Self, StackError> {
        Ok(Self {
            stack: BoundedStack::new(capacity)?,
            tracker: Mutex::new(Tracker {
                pushed: Vec::new(),
                popped: Vec::new(),
                truncated: Vec::new(),
                history: StackHistory::new(capacity.get() as u64),
                step: 0,
            }),
        })
    }

    fn tracker(&self) -> MutexGuard<'_, Tracker> {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push on behalf of `thread_id`.
    pub fn push(&self, thread_id: u64, value: i32) -> Result<(), StackError> {
        let mut tracker = self.tracker();
        let result = self.stack.push(value);
        match result {
            Ok(()) => {
                tracker.pushed.push(value);
                tracker.record(thread_id, StackOpType::Push(value));
            }
            Err(StackError::Full) => tracker.record(thread_id, StackOpType::PushFull(value)),
            Err(_) => {}
        }
        result
    }

    /// Pop on behalf of `thread_id`.
    pub fn pop(&self, thread_id: u64) -> PopOutcome {
        let mut tracker = self.tracker();
        let outcome = self.stack.pop();
        match outcome {
            PopOutcome::Value(v) => {
                tracker.popped.push(v);
                tracker.record(thread_id, StackOpType::Pop(v));
            }
            PopOutcome::Empty => tracker.record(thread_id, StackOpType::PopEmpty),
        }
        outcome
    }

    /// Resize on behalf of `thread_id`, remembering what a shrink discards.
    pub fn resize(&self, thread_id: u64, new_capacity: usize) -> Result<(), StackError> {
        let mut tracker = self.tracker();
        let before = self.stack.snapshot();
        let result = self.stack.resize(new_capacity);
        let capacity = new_capacity as u64;
        match result {
            Ok(()) => {
                if before.count() > new_capacity {
                    tracker
                        .truncated
                        .extend_from_slice(&before.contents[new_capacity..]);
                }
                tracker.record(thread_id, StackOpType::Resize { capacity });
            }
            Err(_) => tracker.record(thread_id, StackOpType::ResizeRejected { capacity }),
        }
        result
    }

    /// The underlying stack.
    #[must_use]
    pub fn inner(&self) -> &BoundedStack {
        &self.stack
    }
}

impl BoundedStackProperties for TrackedStack {
    fn pushed_elements(&self) -> Vec<i32> {
        self.tracker().pushed.clone()
    }

    fn popped_elements(&self) -> Vec<i32> {
        self.tracker().popped.clone()
    }

    fn truncated_elements(&self) -> Vec<i32> {
        self.tracker().truncated.clone()
    }

    fn current_contents(&self) -> Vec<i32> {
        self.stack.snapshot().contents
    }

    fn count(&self) -> u64 {
        self.stack.len() as u64
    }

    fn capacity(&self) -> u64 {
        self.stack.capacity() as u64
    }

    fn history(&self) -> StackHistory {
        self.tracker().history.clone()
    }
}
