//! Deliberately broken stacks.
//!
//! Each one gets a single detail of the contract wrong. The DST runner and
//! the property checker must catch all of them; if a change to either makes
//! one of these pass, the change weakened the checks.

use std::sync::{Mutex, MutexGuard};

use istack::{Capacity, PopOutcome, StackError, StackSnapshot};

use crate::fault_injection::DstTestableStack;

struct Slots {
    buf: Vec<i32>,
    capacity: usize,
}

impl Slots {
    fn new(capacity: Capacity) -> Mutex<Self> {
        Mutex::new(Self {
            buf: Vec::with_capacity(capacity.get()),
            capacity: capacity.get(),
        })
    }

    fn snapshot(&self) -> StackSnapshot {
        StackSnapshot {
            contents: self.buf.clone(),
            capacity: self.capacity,
        }
    }
}

/// Fallible allocation, so an unallocatable resize is rejected the way the
/// real stack rejects it.
fn allocate(capacity: usize) -> Result<Vec<i32>, StackError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity)
        .map_err(|_| StackError::OutOfResources {
            requested: capacity,
        })?;
    Ok(buf)
}

fn lock(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Accepts one push past capacity (`>` where `>=` belongs).
pub struct OverfillStack {
    slots: Mutex<Slots>,
}

impl DstTestableStack for OverfillStack {
    fn create(capacity: Capacity) -> Result<Self, StackError> {
        Ok(Self {
            slots: Slots::new(capacity),
        })
    }

    fn push(&self, value: i32) -> Result<(), StackError> {
        let mut slots = lock(&self.slots);
        if slots.buf.len() > slots.capacity {
            return Err(StackError::Full);
        }
        slots.buf.push(value);
        Ok(())
    }

    fn pop(&self) -> PopOutcome {
        lock(&self.slots).buf.pop().map_or(PopOutcome::Empty, PopOutcome::Value)
    }

    fn resize(&self, new_capacity: usize) -> Result<(), StackError> {
        let capacity = Capacity::new(new_capacity)?.get();
        let mut slots = lock(&self.slots);
        let mut buf = allocate(capacity)?;
        let keep = slots.buf.len().min(capacity);
        buf.extend_from_slice(&slots.buf[..keep]);
        slots.buf = buf;
        slots.capacity = capacity;
        Ok(())
    }

    fn snapshot(&self) -> StackSnapshot {
        lock(&self.slots).snapshot()
    }
}

/// Shrinking keeps the top elements instead of the bottom ones.
pub struct TopTruncatingStack {
    slots: Mutex<Slots>,
}

impl DstTestableStack for TopTruncatingStack {
    fn create(capacity: Capacity) -> Result<Self, StackError> {
        Ok(Self {
            slots: Slots::new(capacity),
        })
    }

    fn push(&self, value: i32) -> Result<(), StackError> {
        let mut slots = lock(&self.slots);
        if slots.buf.len() >= slots.capacity {
            return Err(StackError::Full);
        }
        slots.buf.push(value);
        Ok(())
    }

    fn pop(&self) -> PopOutcome {
        lock(&self.slots).buf.pop().map_or(PopOutcome::Empty, PopOutcome::Value)
    }

    fn resize(&self, new_capacity: usize) -> Result<(), StackError> {
        let capacity = Capacity::new(new_capacity)?.get();
        let mut slots = lock(&self.slots);
        let mut buf = allocate(capacity)?;
        let excess = slots.buf.len().saturating_sub(capacity);
        buf.extend_from_slice(&slots.buf[excess..]);
        slots.buf = buf;
        slots.capacity = capacity;
        Ok(())
    }

    fn snapshot(&self) -> StackSnapshot {
        lock(&self.slots).snapshot()
    }
}

/// Resize installs a fresh buffer without copying the old contents.
pub struct ForgetfulResizeStack {
    slots: Mutex<Slots>,
}

impl DstTestableStack for ForgetfulResizeStack {
    fn create(capacity: Capacity) -> Result<Self, StackError> {
        Ok(Self {
            slots: Slots::new(capacity),
        })
    }

    fn push(&self, value: i32) -> Result<(), StackError> {
        let mut slots = lock(&self.slots);
        if slots.buf.len() >= slots.capacity {
            return Err(StackError::Full);
        }
        slots.buf.push(value);
        Ok(())
    }

    fn pop(&self) -> PopOutcome {
        lock(&self.slots).buf.pop().map_or(PopOutcome::Empty, PopOutcome::Value)
    }

    fn resize(&self, new_capacity: usize) -> Result<(), StackError> {
        let capacity = Capacity::new(new_capacity)?;
        let mut slots = lock(&self.slots);
        slots.buf = allocate(capacity.get())?;
        slots.capacity = capacity.get();
        Ok(())
    }

    fn snapshot(&self) -> StackSnapshot {
        lock(&self.slots).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultConfig;
    use crate::fault_injection::{DstOp, DstRunner};
    use istack_core::{BoundedStackPropertyChecker, PropertyChecker};

    fn failed_properties<S: DstTestableStack>(capacity: usize, ops: &[DstOp]) -> Vec<&'static str> {
        let mut runner: DstRunner<S> = DstRunner::with_fault_config(
            1,
            Capacity::new(capacity).unwrap(),
            FaultConfig::none(),
        )
        .unwrap();
        for op in ops {
            runner.execute(0, *op).unwrap();
        }
        BoundedStackPropertyChecker::new(&runner)
            .violations()
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    #[test]
    fn test_overfill_detected() {
        let failed = failed_properties::<OverfillStack>(
            2,
            &[DstOp::Push(1), DstOp::Push(2), DstOp::Push(3)],
        );
        assert!(failed.contains(&"CountWithinCapacity"), "{:?}", failed);
        assert!(failed.contains(&"FullRejection"), "{:?}", failed);
    }

    #[test]
    fn test_top_truncation_detected() {
        let failed = failed_properties::<TopTruncatingStack>(
            3,
            &[DstOp::Push(1), DstOp::Push(2), DstOp::Push(3), DstOp::Resize(1)],
        );
        assert!(failed.contains(&"NoDuplicates"), "{:?}", failed);
        assert!(failed.contains(&"HistoryMatchesState"), "{:?}", failed);
    }

    #[test]
    fn test_forgetful_resize_detected() {
        let failed = failed_properties::<ForgetfulResizeStack>(
            4,
            &[DstOp::Push(1), DstOp::Push(2), DstOp::Resize(8)],
        );
        assert!(failed.contains(&"NoLostElements"), "{:?}", failed);
    }

    #[test]
    fn test_unallocatable_resize_rejected_by_every_stack() {
        fn rejects<S: DstTestableStack>() {
            let stack = S::create(Capacity::new(2).unwrap()).unwrap();
            stack.push(1).unwrap();
            let before = stack.snapshot();
            assert!(matches!(
                stack.resize(crate::UNALLOCATABLE_CAPACITY),
                Err(StackError::OutOfResources { .. })
            ));
            assert_eq!(stack.snapshot(), before);
        }
        rejects::<OverfillStack>();
        rejects::<TopTruncatingStack>();
        rejects::<ForgetfulResizeStack>();
    }

    #[test]
    fn test_correct_behaviour_on_same_ops() {
        let failed = failed_properties::<istack::BoundedStack>(
            3,
            &[DstOp::Push(1), DstOp::Push(2), DstOp::Push(3), DstOp::Resize(1)],
        );
        assert!(failed.is_empty(), "{:?}", failed);
    }
}
