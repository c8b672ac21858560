//! # istack-core
//!
//! Invariant checking for the shared bounded integer stack.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - `BoundedStackProperties`, the view a stack exposes for checking, and
//!   `BoundedStackPropertyChecker`, which checks it
//!
//! Nothing here depends on how the stack is implemented; the real stack,
//! test doubles and deliberately broken variants are all checked the same way.

pub mod counterexample;
pub mod invariants;
pub mod property;

pub use counterexample::{Counterexample, StateSnapshot, StateViolation, ThreadAction};
pub use invariants::{
    BoundedStackProperties, BoundedStackPropertyChecker, StackHistory, StackOpType,
    StackOperation,
};
pub use property::{PropertyChecker, PropertyResult};
