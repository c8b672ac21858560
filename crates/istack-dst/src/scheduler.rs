//! Deterministic choice of which simulated caller runs next.

use crate::random::DeterministicRng;

/// Outcome of a yield point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Keep running the current thread
    Continue,
    /// Switch to the given thread
    SwitchTo(usize),
}

/// Seeded scheduler over a fixed set of simulated threads.
#[derive(Debug, Clone)]
pub struct Scheduler {
    rng: DeterministicRng,
    threads_count: usize,
    switch_probability: f64,
    current: usize,
}

impl Scheduler {
    pub fn new(rng: DeterministicRng, threads_count: usize, switch_probability: f64) -> Self {
        debug_assert!(threads_count > 0, "Must have at least one thread");
        Self {
            rng,
            threads_count,
            switch_probability,
            current: 0,
        }
    }

    /// Thread that currently runs.
    #[must_use]
    pub fn current_thread(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn threads_count(&self) -> usize {
        self.threads_count
    }

    /// Maybe switch to a different, randomly chosen thread.
    pub fn decide(&mut self) -> ScheduleDecision {
        if self.threads_count == 1 || !self.rng.gen_bool(self.switch_probability) {
            return ScheduleDecision::Continue;
        }
        let offset = self.rng.gen_range(1..self.threads_count);
        self.current = (self.current + offset) % self.threads_count;
        ScheduleDecision::SwitchTo(self.current)
    }

    /// Switch to the next thread in round-robin order.
    pub fn force_switch(&mut self) -> usize {
        self.current = (self.current + 1) % self.threads_count;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_thread_never_switches() {
        let mut scheduler = Scheduler::new(DeterministicRng::new(1), 1, 1.0);
        for _ in 0..50 {
            assert_eq!(scheduler.decide(), ScheduleDecision::Continue);
        }
    }

    #[test]
    fn test_switch_goes_elsewhere() {
        let mut scheduler = Scheduler::new(DeterministicRng::new(1), 4, 1.0);
        for _ in 0..100 {
            let before = scheduler.current_thread();
            match scheduler.decide() {
                ScheduleDecision::SwitchTo(next) => {
                    assert_ne!(next, before);
                    assert!(next < 4);
                }
                ScheduleDecision::Continue => panic!("probability 1.0 must switch"),
            }
        }
    }

    #[test]
    fn test_force_switch_round_robin() {
        let mut scheduler = Scheduler::new(DeterministicRng::new(1), 3, 0.0);
        assert_eq!(scheduler.force_switch(), 1);
        assert_eq!(scheduler.force_switch(), 2);
        assert_eq!(scheduler.force_switch(), 0);
    }
}
