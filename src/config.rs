//! Processor configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Configuration for the task processor.
///
/// Durations are expressed in abstract time units scaled by [`time_unit`];
/// production uses one-second units, tests shrink them to milliseconds so
/// simulated executions finish quickly.
///
/// [`time_unit`]: ProcessorConfig::time_unit
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Scheduler tick period, in time units.
    pub tick_units: u64,
    /// Wall-clock length of one time unit.
    pub time_unit: Duration,
    /// Minimum simulated duration when a task declares no estimate.
    pub min_duration: u64,
    /// Maximum simulated duration when a task declares no estimate.
    pub max_duration: u64,
    /// Variance applied around a declared estimate (0.3 = ±30%).
    pub duration_variance: f64,
    /// Probability of a simulated execution succeeding, in percent.
    pub success_rate: u8,
    /// Fraction of a completed task's cost added to the reward pool.
    pub reward_rate: Decimal,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tick_units: 5,
            time_unit: Duration::from_secs(1),
            min_duration: 3,
            max_duration: 8,
            duration_variance: 0.3,
            success_rate: 90,
            reward_rate: dec!(0.05),
        }
    }
}

impl ProcessorConfig {
    /// Wall-clock scheduler tick period.
    pub fn tick_interval(&self) -> Duration {
        self.time_unit * self.tick_units as u32
    }

    /// Wall-clock length of a simulated execution of `units` time units.
    pub fn scaled(&self, units: u64) -> Duration {
        self.time_unit * units as u32
    }

    /// Build a config from `COMPUTE_POOL_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let parse_u64 = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        let time_unit_ms = parse_u64(
            "COMPUTE_POOL_TIME_UNIT_MS",
            defaults.time_unit.as_millis() as u64,
        );

        let success_rate = std::env::var("COMPUTE_POOL_SUCCESS_RATE")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(defaults.success_rate)
            .min(100);

        let reward_rate = std::env::var("COMPUTE_POOL_REWARD_RATE")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
            .unwrap_or(defaults.reward_rate);

        Self {
            tick_units: parse_u64("COMPUTE_POOL_TICK_UNITS", defaults.tick_units),
            time_unit: Duration::from_millis(time_unit_ms),
            min_duration: parse_u64("COMPUTE_POOL_MIN_DURATION", defaults.min_duration),
            max_duration: parse_u64("COMPUTE_POOL_MAX_DURATION", defaults.max_duration),
            duration_variance: defaults.duration_variance,
            success_rate,
            reward_rate,
        }
    }
}
