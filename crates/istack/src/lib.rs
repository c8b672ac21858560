//! # istack
//!
//! A single shared, bounded, last-in-first-out integer stack and the
//! file-like device that exposes it.
//!
//! - `stack`: [`BoundedStack`], push / pop / resize under one lock
//! - `device`: [`StackDevice`] and [`DeviceHandle`], read-as-pop,
//!   write-as-push and a `SET_SIZE` control command over byte buffers
//! - `tracked`: [`TrackedStack`], records history for `istack-core` checks
//! - `config`: [`DeviceConfig`]
//! - `kani_proofs`: bounded proofs (under `#[cfg(kani)]`)
//!
//! ```
//! use istack::{BoundedStack, Capacity, PopOutcome};
//!
//! let stack = BoundedStack::new(Capacity::new(2).unwrap()).unwrap();
//! stack.push(1).unwrap();
//! stack.push(2).unwrap();
//! assert!(stack.push(3).is_err());
//! stack.resize(1).unwrap();
//! assert_eq!(stack.pop(), PopOutcome::Value(1));
//! assert_eq!(stack.pop(), PopOutcome::Empty);
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod kani_proofs;
pub mod stack;
pub mod tracked;

pub use config::DeviceConfig;
pub use device::{DeviceHandle, DeviceStats, StackDevice, INT_SIZE, IOC_SET_SIZE};
pub use error::{DeviceError, StackError};
pub use stack::{BoundedStack, Capacity, PopOutcome, StackSnapshot, DEFAULT_CAPACITY};
pub use tracked::TrackedStack;
