//! # istack-dst
//!
//! Deterministic simulation testing for the bounded integer stack.
//!
//! Time, randomness, scheduling and faults are all derived from one seed,
//! so any failing run can be replayed exactly.
//!
//! - `fault_injection`: [`DstRunner`], faults at operation boundaries
//! - `harness`: [`DstHarness`], simulated callers interleaved by a seeded scheduler
//! - `buggy`: broken stacks the checks must reject
//!
//! ## Usage
//!
//! ```rust
//! use istack_dst::DstEnv;
//!
//! let mut env = DstEnv::new(12345);
//!
//! env.clock().advance_ns(1_000_000);
//! let value: u64 = env.rng().gen();
//! let choice = env.rng().gen_range(0..10);
//!
//! if env.fault().should_fail() {
//!     // simulate failure
//! }
//! # let _ = (value, choice);
//! ```
//!
//! ## Reproducibility
//!
//! ```bash
//! DST_SEED=12345 cargo test -p istack-dst
//! ```

pub mod buggy;
pub mod clock;
pub mod env;
pub mod fault;
pub mod fault_injection;
pub mod harness;
pub mod random;
pub mod scheduler;

pub use buggy::{ForgetfulResizeStack, OverfillStack, TopTruncatingStack};
pub use clock::SimClock;
pub use env::DstEnv;
pub use fault::{FaultConfig, FaultInjector, FaultStats};
pub use fault_injection::{
    run_dst_scenario, DstOp, DstResult, DstRunner, DstStats, DstTestableStack, FaultPoint,
    FaultType, OpOutcome, UNALLOCATABLE_CAPACITY,
};
pub use harness::{DstHarness, HarnessConfig, HarnessResult, Workload};
pub use random::DeterministicRng;
pub use scheduler::{ScheduleDecision, Scheduler};

/// Get DST seed from environment or generate random one.
///
/// Prints the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
/// An unparseable `DST_SEED` is reported and replaced by a random seed.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED").map(|s| s.trim().parse::<u64>()) {
        Ok(Ok(seed)) => {
            println!("DST_SEED={} (from environment)", seed);
            seed
        }
        Ok(Err(_)) => {
            let seed = rand::random::<u64>();
            println!("DST_SEED is not a valid u64; using DST_SEED={} (randomly generated)", seed);
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>();
            println!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}
