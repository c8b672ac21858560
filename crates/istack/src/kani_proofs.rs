//! Kani proof harnesses for the bounded stack.
//!
//! Bounded model checking of the sequential contract for all inputs up to
//! small capacities.
//!
//! ```bash
//! cargo kani -p istack
//! cargo kani -p istack --harness proof_full_push_rejected
//! ```
//!
//! Kani does not explore thread interleavings; those are covered by the
//! loom tests in `stack.rs` and the stateright model in `istack-model`.

#[cfg(kani)]
mod proofs {
    use crate::error::StackError;
    use crate::stack::{BoundedStack, Capacity, PopOutcome};

    fn stack_of(capacity: usize) -> BoundedStack {
        match BoundedStack::new(Capacity::new(capacity).unwrap()) {
            Ok(stack) => stack,
            Err(_) => {
                kani::assume(false);
                unreachable!()
            }
        }
    }

    /// Any value pushed is the value popped next.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_pop_returns_pushed_value() {
        let stack = stack_of(2);
        let value: i32 = kani::any();

        kani::assert(stack.push(value).is_ok(), "push into empty stack succeeds");
        kani::assert(
            stack.pop() == PopOutcome::Value(value),
            "pop returns the value just pushed",
        );
        kani::assert(stack.pop() == PopOutcome::Empty, "stack is empty again");
    }

    /// Pushing v1 then v2 pops v2 then v1.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_lifo_order() {
        let stack = stack_of(2);
        let v1: i32 = kani::any();
        let v2: i32 = kani::any();

        kani::assert(stack.push(v1).is_ok(), "first push fits");
        kani::assert(stack.push(v2).is_ok(), "second push fits");
        kani::assert(stack.pop() == PopOutcome::Value(v2), "last in, first out");
        kani::assert(stack.pop() == PopOutcome::Value(v1), "then the first");
    }

    /// A full stack rejects any value and keeps its count.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_full_push_rejected() {
        let capacity: usize = kani::any();
        kani::assume(capacity >= 1 && capacity <= 3);
        let stack = stack_of(capacity);

        for i in 0..capacity {
            kani::assert(stack.push(i as i32).is_ok(), "fill below capacity");
        }

        let value: i32 = kani::any();
        kani::assert(stack.push(value) == Err(StackError::Full), "full rejects");
        kani::assert(stack.len() == capacity, "count unchanged");
    }

    /// Resize keeps the bottom min(count, new) elements and never breaks
    /// count <= capacity.
    #[kani::proof]
    #[kani::unwind(5)]
    fn proof_resize_keeps_prefix() {
        let count: usize = kani::any();
        let new_capacity: usize = kani::any();
        kani::assume(count <= 3);
        kani::assume(new_capacity >= 1 && new_capacity <= 3);

        let stack = stack_of(3);
        for i in 0..count {
            let _ = stack.push(i as i32 + 1);
        }

        kani::assert(stack.resize(new_capacity).is_ok(), "small resize succeeds");

        let snapshot = stack.snapshot();
        let keep = count.min(new_capacity);
        kani::assert(snapshot.capacity == new_capacity, "capacity applied");
        kani::assert(snapshot.count() == keep, "count truncated to capacity");
        for i in 0..keep {
            kani::assert(snapshot.contents[i] == i as i32 + 1, "bottom elements kept");
        }
    }

    /// Resize to zero is rejected and changes nothing.
    #[kani::proof]
    #[kani::unwind(3)]
    fn proof_resize_zero_rejected() {
        let stack = stack_of(2);
        let value: i32 = kani::any();
        let _ = stack.push(value);

        kani::assert(
            matches!(stack.resize(0), Err(StackError::InvalidArgument(_))),
            "zero capacity rejected",
        );
        kani::assert(stack.capacity() == 2, "capacity unchanged");
        kani::assert(stack.pop() == PopOutcome::Value(value), "contents unchanged");
    }
}
