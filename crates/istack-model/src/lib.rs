//! # istack-model
//!
//! Exhaustive checking of the bounded stack protocol.
//!
//! - `bounded_stack`: a stateright model of threads taking the guard and
//!   running push, pop or a three-step resize inside it
//! - `verifier`: bounded-exhaustive comparison of an implementation with
//!   the sequential model
//!
//! ```ignore
//! cargo test -p istack-model
//! ```
//!
//! ```
//! use istack::BoundedStack;
//! use istack_model::{verify_implementation, VerifierConfig};
//!
//! let result = verify_implementation::<BoundedStack>(&VerifierConfig::quick());
//! assert!(result.passed);
//! ```

pub mod bounded_stack;
pub mod verifier;

pub use bounded_stack::{ModelOp, Phase, StackAction, StackModel, StackState, ThreadId, ThreadState};
pub use verifier::{verify_implementation, VerifiableStack, VerificationResult, VerifierConfig, VerifyOp};
