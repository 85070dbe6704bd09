//! Execution simulator — stochastic duration and outcome draws.
//!
//! Randomness sits behind the `ExecutionModel` trait so tests can force
//! exact durations and outcomes; the production `StochasticModel` is
//! seedable for deterministic statistical tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ProcessorConfig;

/// Failure reasons drawn for unsuccessful simulated executions.
pub const FAILURE_REASONS: [&str; 5] = [
    "Simulated network timeout",
    "Simulated resource unavailable",
    "Simulated computation error",
    "Simulated memory allocation failed",
    "Simulated execution timeout",
];

/// Result of one simulated execution draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(&'static str),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Source of simulated durations and outcomes for the executor.
pub trait ExecutionModel: Send + Sync {
    /// Draw an execution duration in time units.
    ///
    /// With an estimate, uniform within ±variance of it, floored at one
    /// time unit; without, uniform over the configured default range.
    fn draw_duration(&self, estimated: Option<u64>) -> u64;

    /// Draw the success/failure outcome of one execution.
    fn draw_outcome(&self) -> Outcome;
}

/// Production model: seedable RNG over the configured parameters.
pub struct StochasticModel {
    rng: std::sync::Mutex<StdRng>,
    min_duration: u64,
    max_duration: u64,
    variance: f64,
    success_rate: u8,
}

impl StochasticModel {
    /// Entropy-seeded model from the processor config.
    pub fn new(config: &ProcessorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministically seeded model, for tests.
    pub fn seeded(config: &ProcessorConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &ProcessorConfig, rng: StdRng) -> Self {
        Self {
            rng: std::sync::Mutex::new(rng),
            min_duration: config.min_duration,
            max_duration: config.max_duration.max(config.min_duration),
            variance: config.duration_variance,
            success_rate: config.success_rate.min(100),
        }
    }
}

impl ExecutionModel for StochasticModel {
    fn draw_duration(&self, estimated: Option<u64>) -> u64 {
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        match estimated {
            Some(estimate) => {
                let estimate = estimate as f64;
                let spread = estimate * self.variance;
                let lo = ((estimate - spread).floor().max(1.0)) as u64;
                let hi = ((estimate + spread).floor() as u64).max(lo);
                rng.gen_range(lo..=hi)
            }
            None => rng.gen_range(self.min_duration..=self.max_duration),
        }
    }

    fn draw_outcome(&self) -> Outcome {
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        if rng.gen_range(0..100u32) < u32::from(self.success_rate) {
            Outcome::Success
        } else {
            Outcome::Failure(FAILURE_REASONS[rng.gen_range(0..FAILURE_REASONS.len())])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(seed: u64) -> StochasticModel {
        StochasticModel::seeded(&ProcessorConfig::default(), seed)
    }

    #[test]
    fn estimated_duration_stays_within_variance_bounds() {
        let model = model(42);
        for _ in 0..1000 {
            let duration = model.draw_duration(Some(10));
            assert!((7..=13).contains(&duration), "duration {duration} out of [7, 13]");
        }
    }

    #[test]
    fn duration_floors_at_one_unit() {
        let model = model(7);
        for _ in 0..200 {
            assert_eq!(model.draw_duration(Some(1)), 1);
        }
    }

    #[test]
    fn default_range_used_without_estimate() {
        let model = model(99);
        for _ in 0..1000 {
            let duration = model.draw_duration(None);
            assert!((3..=8).contains(&duration), "duration {duration} out of [3, 8]");
        }
    }

    #[test]
    fn same_seed_draws_same_sequence() {
        let a = model(1234);
        let b = model(1234);
        for _ in 0..50 {
            assert_eq!(a.draw_duration(Some(10)), b.draw_duration(Some(10)));
            assert_eq!(a.draw_outcome(), b.draw_outcome());
        }
    }

    #[test]
    fn success_rate_statistically_near_ninety_percent() {
        let model = model(2026);
        let trials = 5000;
        let successes = (0..trials)
            .filter(|_| model.draw_outcome().is_success())
            .count();
        let fraction = successes as f64 / trials as f64;
        assert!(
            (0.87..=0.93).contains(&fraction),
            "success fraction {fraction} not consistent with 90%"
        );
    }

    #[test]
    fn success_rate_edges() {
        let never = StochasticModel::seeded(
            &ProcessorConfig {
                success_rate: 0,
                ..Default::default()
            },
            5,
        );
        let always = StochasticModel::seeded(
            &ProcessorConfig {
                success_rate: 100,
                ..Default::default()
            },
            5,
        );
        for _ in 0..100 {
            assert!(!never.draw_outcome().is_success());
            assert!(always.draw_outcome().is_success());
        }
    }

    #[test]
    fn failure_reason_comes_from_fixed_set() {
        let model = StochasticModel::seeded(
            &ProcessorConfig {
                success_rate: 0,
                ..Default::default()
            },
            11,
        );
        for _ in 0..100 {
            match model.draw_outcome() {
                Outcome::Failure(reason) => assert!(FAILURE_REASONS.contains(&reason)),
                Outcome::Success => panic!("success at rate 0"),
            }
        }
    }
}
