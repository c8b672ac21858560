//! Invariant traits for the bounded stack.
//!
//! - `bounded_stack`: capacity bounds, element conservation across pops and
//!   truncating resizes, LIFO order, full rejection, history/state agreement

pub mod bounded_stack;

pub use bounded_stack::{
    BoundedStackProperties, BoundedStackPropertyChecker, StackHistory, StackOpType,
    StackOperation,
};
