//! Probabilistic fault decisions.

use crate::random::DeterministicRng;

/// How often faults and delays are injected.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Probability that an operation boundary injects a fault
    pub failure_probability: f64,
    /// Probability that an operation boundary is delayed
    pub delay_probability: f64,
    /// Upper bound of one simulated delay
    pub delay_us_max: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            failure_probability: 0.05,
            delay_probability: 0.1,
            delay_us_max: 100,
        }
    }
}

impl FaultConfig {
    /// No faults, no delays.
    pub fn none() -> Self {
        Self {
            failure_probability: 0.0,
            delay_probability: 0.0,
            delay_us_max: 1,
        }
    }

    /// Frequent faults for stress runs.
    pub fn aggressive() -> Self {
        Self {
            failure_probability: 0.2,
            delay_probability: 0.3,
            delay_us_max: 1_000,
        }
    }
}

/// Counters for injected faults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub checks_count: u64,
    pub faults_count: u64,
    pub delays_count: u64,
}

/// Decides, deterministically, whether to inject a fault.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        debug_assert!((0.0..=1.0).contains(&config.failure_probability));
        debug_assert!((0.0..=1.0).contains(&config.delay_probability));
        debug_assert!(config.delay_us_max > 0, "Delay bound must be positive");
        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    /// Should the current boundary fail?
    pub fn should_fail(&mut self) -> bool {
        self.stats.checks_count += 1;
        let fail = self.rng.gen_bool(self.config.failure_probability);
        if fail {
            self.stats.faults_count += 1;
        }
        fail
    }

    /// Delay in microseconds to inject at the current boundary, if any.
    pub fn should_delay(&mut self) -> Option<u64> {
        if self.rng.gen_bool(self.config.delay_probability) {
            self.stats.delays_count += 1;
            Some(self.rng.gen_range(1..=self.config.delay_us_max))
        } else {
            None
        }
    }

    /// Pick one of `choices` uniformly. `choices` must not be empty.
    pub fn choose<T: Copy>(&mut self, choices: &[T]) -> T {
        debug_assert!(!choices.is_empty(), "Nothing to choose from");
        choices[self.rng.gen_range(0..choices.len())]
    }

    #[must_use]
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &FaultStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_fails() {
        let mut injector = FaultInjector::new(DeterministicRng::new(3), FaultConfig::none());
        for _ in 0..500 {
            assert!(!injector.should_fail());
            assert!(injector.should_delay().is_none());
        }
        assert_eq!(injector.stats().faults_count, 0);
        assert_eq!(injector.stats().checks_count, 500);
    }

    #[test]
    fn test_aggressive_fails_sometimes() {
        let mut injector =
            FaultInjector::new(DeterministicRng::new(3), FaultConfig::aggressive());
        let faults = (0..1000).filter(|_| injector.should_fail()).count();
        assert!(faults > 50 && faults < 400, "faults = {}", faults);
    }

    #[test]
    fn test_delay_within_bound() {
        let config = FaultConfig {
            delay_probability: 1.0,
            delay_us_max: 10,
            ..FaultConfig::default()
        };
        let mut injector = FaultInjector::new(DeterministicRng::new(9), config);
        for _ in 0..100 {
            let delay = injector.should_delay().unwrap();
            assert!((1..=10).contains(&delay));
        }
    }
}
