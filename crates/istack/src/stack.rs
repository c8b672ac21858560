//! Bounded LIFO integer stack behind a single exclusive lock.
//!
//! # Invariants
//!
//! Whenever the lock is not held:
//!
//! | Property | Meaning |
//! |----------|---------|
//! | CountWithinCapacity | `0 <= count <= capacity` |
//! | CapacityPositive | `capacity >= 1` |
//! | Contents | `buf[..count]` is the stack, bottom to top |
//!
//! `count` is `buf.len()`, and `buf` always has room for `capacity`
//! elements, so push never allocates.
//!
//! # Concurrency
//!
//! Push, pop and resize are each one critical section over the whole
//! stack. Resize allocates, copies and swaps while holding the lock, so no
//! caller can observe a capacity from one buffer paired with contents from
//! another. Work under the lock is O(1) for push and pop and
//! O(min(count, new capacity)) for resize.
//!
//! # Shrinking
//!
//! A resize below the current count keeps the bottom `new_capacity`
//! elements and silently discards the rest. Callers that care must check
//! `len()` before resizing.
//!
//! # Loom
//!
//! Under `--cfg loom` the lock is `loom::sync::Mutex`:
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test -p istack --release
//! ```

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

#[cfg(loom)]
use loom::sync::{Mutex, MutexGuard};
#[cfg(not(loom))]
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::StackError;

/// Capacity a freshly created device stack starts with.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A validated stack capacity, always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u64")]
pub struct Capacity(NonZeroUsize);

impl Capacity {
    /// Validate a capacity. Zero is rejected with `InvalidArgument`.
    pub fn new(capacity: usize) -> Result<Self, StackError> {
        NonZeroUsize::new(capacity)
            .map(Self)
            .ok_or_else(|| StackError::InvalidArgument("capacity 0".to_string()))
    }

    /// The capacity as a plain count of elements.
    #[must_use]
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Capacity from a count known at compile time; zero becomes one.
    #[must_use]
    pub const fn saturating(capacity: usize) -> Self {
        Self(NonZeroUsize::MIN.saturating_add(capacity.saturating_sub(1)))
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self::saturating(DEFAULT_CAPACITY)
    }
}

impl TryFrom<i64> for Capacity {
    type Error = StackError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let capacity = usize::try_from(value)
            .map_err(|_| StackError::InvalidArgument(format!("capacity {}", value)))?;
        Self::new(capacity)
    }
}

impl FromStr for Capacity {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| StackError::InvalidArgument(format!("'{}' is not an integer", s)))?;
        Self::try_from(value)
    }
}

impl From<Capacity> for u64 {
    fn from(capacity: Capacity) -> Self {
        capacity.get() as u64
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a pop: a value, or the end-of-data marker.
///
/// Popping an empty stack is normal operation, so it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopOutcome {
    /// The former top of the stack.
    Value(i32),
    /// The stack held no elements; nothing changed.
    Empty,
}

impl PopOutcome {
    /// The popped value, if any.
    #[must_use]
    pub fn value(self) -> Option<i32> {
        match self {
            PopOutcome::Value(v) => Some(v),
            PopOutcome::Empty => None,
        }
    }

    /// True for the end-of-data marker.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == PopOutcome::Empty
    }
}

/// Copy of the stack's state taken under the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackSnapshot {
    /// Live elements, bottom to top
    pub contents: Vec<i32>,
    /// Capacity at the time of the snapshot
    pub capacity: usize,
}

impl StackSnapshot {
    /// Number of live elements.
    #[must_use]
    pub fn count(&self) -> usize {
        self.contents.len()
    }
}

/// State guarded by the lock.
struct Slots {
    buf: Vec<i32>,
    capacity: usize,
}

impl Slots {
    fn holds_invariants(&self) -> bool {
        self.capacity >= 1 && self.buf.len() <= self.capacity && self.buf.capacity() >= self.capacity
    }
}

/// Shared bounded stack of `i32`.
///
/// Construct one and share it by `Arc`; every method takes `&self`.
pub struct BoundedStack {
    slots: Mutex<Slots>,
}

impl BoundedStack {
    /// Create an empty stack with room for `capacity` elements.
    ///
    /// Fails with `OutOfResources` if the buffer cannot be allocated.
    pub fn new(capacity: Capacity) -> Result<Self, StackError> {
        let buf = allocate(capacity.get())?;
        Ok(Self {
            slots: Mutex::new(Slots {
                buf,
                capacity: capacity.get(),
            }),
        })
    }

    /// Acquire the guard.
    ///
    /// A poisoned lock is recovered: no critical section panics between
    /// two writes, so the state behind it is always consistent.
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Place `value` on top of the stack.
    ///
    /// Fails with `Full` when `count == capacity`; the stack is unchanged.
    pub fn push(&self, value: i32) -> Result<(), StackError> {
        let mut slots = self.lock();
        if slots.buf.len() >= slots.capacity {
            return Err(StackError::Full);
        }
        slots.buf.push(value);
        debug_assert!(slots.holds_invariants());
        Ok(())
    }

    /// Remove and return the top element, or `Empty` if there is none.
    pub fn pop(&self) -> PopOutcome {
        let mut slots = self.lock();
        match slots.buf.pop() {
            Some(value) => PopOutcome::Value(value),
            None => PopOutcome::Empty,
        }
    }

    /// Change the capacity to `new_capacity`.
    ///
    /// All or nothing: on `InvalidArgument` (zero) or `OutOfResources` the
    /// old buffer, capacity and contents are untouched. Shrinking below the
    /// current count keeps the bottom `new_capacity` elements.
    pub fn resize(&self, new_capacity: usize) -> Result<(), StackError> {
        let capacity = Capacity::new(new_capacity)?;

        let mut slots = self.lock();
        let mut buf = allocate(capacity.get())?;
        let keep = slots.buf.len().min(capacity.get());
        buf.extend_from_slice(&slots.buf[..keep]);
        slots.buf = buf;
        slots.capacity = capacity.get();
        debug_assert!(slots.holds_invariants());
        Ok(())
    }

    /// Number of live elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().buf.len()
    }

    /// True if there are no live elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().buf.is_empty()
    }

    /// Current capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Contents and capacity, copied atomically.
    #[must_use]
    pub fn snapshot(&self) -> StackSnapshot {
        let slots = self.lock();
        StackSnapshot {
            contents: slots.buf.clone(),
            capacity: slots.capacity,
        }
    }
}

impl Default for BoundedStack {
    fn default() -> Self {
        Self {
            slots: Mutex::new(Slots {
                buf: Vec::with_capacity(DEFAULT_CAPACITY),
                capacity: DEFAULT_CAPACITY,
            }),
        }
    }
}

impl fmt::Debug for BoundedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.lock();
        f.debug_struct("BoundedStack")
            .field("count", &slots.buf.len())
            .field("capacity", &slots.capacity)
            .finish()
    }
}

/// Allocate an empty buffer with room for exactly `capacity` elements.
fn allocate(capacity: usize) -> Result<Vec<i32>, StackError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity)
        .map_err(|_| StackError::OutOfResources {
            requested: capacity,
        })?;
    Ok(buf)
}


#[cfg(all(test, not(loom)))]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Push(i32),
        Pop,
        Resize(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => any::<i32>().prop_map(Op::Push),
            3 => Just(Op::Pop),
            1 => (0usize..12).prop_map(Op::Resize),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The stack behaves exactly like a Vec with a capacity check and
        /// truncation on shrink.
        #[test]
        fn prop_matches_sequential_model(
            initial in 1usize..8,
            ops in prop::collection::vec(op(), 1..200)
        ) {
            let stack = BoundedStack::new(Capacity::new(initial).unwrap()).unwrap();
            let mut model: Vec<i32> = Vec::new();
            let mut capacity = initial;

            for op in ops {
                match op {
                    Op::Push(v) => {
                        let result = stack.push(v);
                        if model.len() == capacity {
                            prop_assert_eq!(result, Err(StackError::Full));
                        } else {
                            prop_assert_eq!(result, Ok(()));
                            model.push(v);
                        }
                    }
                    Op::Pop => {
                        prop_assert_eq!(stack.pop().value(), model.pop());
                    }
                    Op::Resize(n) => {
                        let result = stack.resize(n);
                        if n == 0 {
                            prop_assert!(matches!(result, Err(StackError::InvalidArgument(_))));
                        } else {
                            prop_assert_eq!(result, Ok(()));
                            model.truncate(n);
                            capacity = n;
                        }
                    }
                }
                let snapshot = stack.snapshot();
                prop_assert!(snapshot.capacity >= 1);
                prop_assert!(snapshot.count() <= snapshot.capacity);
                prop_assert_eq!(&snapshot.contents, &model);
                prop_assert_eq!(snapshot.capacity, capacity);
            }
        }

        #[test]
        fn prop_shrink_keeps_prefix(
            values in prop::collection::vec(any::<i32>(), 1..64),
            new_capacity in 1usize..64
        ) {
            let stack = BoundedStack::new(Capacity::new(64).unwrap()).unwrap();
            for &v in &values {
                stack.push(v).unwrap();
            }
            stack.resize(new_capacity).unwrap();
            let keep = values.len().min(new_capacity);
            prop_assert_eq!(stack.snapshot().contents, values[..keep].to_vec());
        }
    }
}

/// Loom tests - these exhaustively check all interleavings
#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    fn stack_of(capacity: usize) -> BoundedStack {
        BoundedStack::new(Capacity::new(capacity).unwrap()).unwrap()
    }

    #[test]
    fn test_push_push() {
        loom::model(|| {
            let stack = Arc::new(stack_of(2));

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.push(1));
            let h2 = thread::spawn(move || s2.push(2));

            assert!(h1.join().unwrap().is_ok());
            assert!(h2.join().unwrap().is_ok());

            let mut values = stack.snapshot().contents;
            values.sort_unstable();
            assert_eq!(values, vec![1, 2]);
        });
    }

    #[test]
    fn test_push_into_last_slot() {
        loom::model(|| {
            let stack = Arc::new(stack_of(1));

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.push(1));
            let h2 = thread::spawn(move || s2.push(2));

            let r1 = h1.join().unwrap();
            let r2 = h2.join().unwrap();

            // Exactly one push wins the only slot.
            assert!(r1.is_ok() ^ r2.is_ok());
            assert_eq!(stack.len(), 1);
        });
    }

    #[test]
    fn test_concurrent_pop() {
        loom::model(|| {
            let stack = Arc::new(stack_of(2));
            stack.push(1).unwrap();

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.pop());
            let h2 = thread::spawn(move || s2.pop());

            match (h1.join().unwrap(), h2.join().unwrap()) {
                (PopOutcome::Value(1), PopOutcome::Empty) => {}
                (PopOutcome::Empty, PopOutcome::Value(1)) => {}
                other => panic!("Unexpected result: {:?}", other),
            }
        });
    }

    #[test]
    fn test_resize_vs_push() {
        loom::model(|| {
            let stack = Arc::new(stack_of(2));
            stack.push(1).unwrap();
            stack.push(2).unwrap();

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.resize(1));
            let h2 = thread::spawn(move || s2.push(3));

            h1.join().unwrap().unwrap();
            let pushed = h2.join().unwrap();

            // Push ran first: full, then truncated to [1].
            // Resize ran first: [1] at capacity 1, push rejected.
            assert_eq!(pushed, Err(StackError::Full));
            let snapshot = stack.snapshot();
            assert_eq!(snapshot.contents, vec![1]);
            assert_eq!(snapshot.capacity, 1);
        });
    }

    #[test]
    fn test_resize_vs_pop() {
        loom::model(|| {
            let stack = Arc::new(stack_of(3));
            for v in 1..=3 {
                stack.push(v).unwrap();
            }

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.resize(1));
            let h2 = thread::spawn(move || s2.pop());

            h1.join().unwrap().unwrap();
            let popped = h2.join().unwrap();

            let snapshot = stack.snapshot();
            match popped {
                // Pop first: [1, 2] truncated to [1].
                PopOutcome::Value(3) => assert_eq!(snapshot.contents, vec![1]),
                // Resize first: [1], then popped.
                PopOutcome::Value(1) => assert!(snapshot.contents.is_empty()),
                other => panic!("Unexpected pop: {:?}", other),
            }
            assert_eq!(snapshot.capacity, 1);
        });
    }
}
