//! The simulation environment: seed, randomness, faults, time, scheduling.

use crate::clock::SimClock;
use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;
use crate::scheduler::Scheduler;

/// Everything nondeterministic in a simulated run, derived from one seed.
pub struct DstEnv {
    seed: u64,
    rng: DeterministicRng,
    fault: FaultInjector,
    clock: SimClock,
    scheduler: Option<Scheduler>,
}

impl DstEnv {
    /// Environment with default fault injection and no scheduler.
    pub fn new(seed: u64) -> Self {
        Self::with_fault_config(seed, FaultConfig::default())
    }

    /// Environment with the given fault configuration.
    pub fn with_fault_config(seed: u64, fault_config: FaultConfig) -> Self {
        Self {
            seed,
            rng: DeterministicRng::new(seed),
            fault: FaultInjector::new(DeterministicRng::new(seed.wrapping_add(1)), fault_config),
            clock: SimClock::new(),
            scheduler: None,
        }
    }

    /// Environment that also schedules `threads_count` simulated threads.
    pub fn with_scheduler(
        seed: u64,
        threads_count: usize,
        switch_probability: f64,
        fault_config: FaultConfig,
    ) -> Self {
        let mut env = Self::with_fault_config(seed, fault_config);
        env.scheduler = Some(Scheduler::new(
            DeterministicRng::new(seed.wrapping_add(2)),
            threads_count,
            switch_probability,
        ));
        env
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn fault(&mut self) -> &mut FaultInjector {
        &mut self.fault
    }

    pub fn clock(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    pub fn scheduler(&mut self) -> Option<&mut Scheduler> {
        self.scheduler.as_mut()
    }

    /// Advance simulated time if the fault injector asks for a delay.
    /// Returns the delay applied.
    pub fn maybe_delay(&mut self) -> Option<u64> {
        let delay = self.fault.should_delay()?;
        self.clock.advance_us(delay);
        Some(delay)
    }

    /// `DST_SEED=<seed>` for failure messages.
    #[must_use]
    pub fn format_seed(&self) -> String {
        format!("DST_SEED={}", self.seed)
    }

    /// One-line summary of the run so far.
    #[must_use]
    pub fn stats(&self) -> String {
        let stats = self.fault.stats();
        format!(
            "{} time_us={} faults={} delays={}",
            self.format_seed(),
            self.clock.now_us(),
            stats.faults_count,
            stats.delays_count
        )
    }
}
