//! Vault aggregate — singleton record of protocol-wide economic counters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Protocol-wide economic counters.
///
/// A single long-lived record, created lazily on first access. The executor
/// is the only writer of `total_tasks_executed` and `reward_pool`; both move
/// together, exactly once per completing task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultAggregate {
    /// Total stake locked behind the credit pool.
    pub total_locked_stake: Decimal,
    /// Total compute credits issued against that stake.
    pub total_credits_issued: Decimal,
    /// Number of tasks that have reached `completed`.
    pub total_tasks_executed: u64,
    /// Accumulated rewards from completed tasks.
    pub reward_pool: Decimal,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl Default for VaultAggregate {
    fn default() -> Self {
        Self {
            total_locked_stake: Decimal::ZERO,
            total_credits_issued: Decimal::ZERO,
            total_tasks_executed: 0,
            reward_pool: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }
}

/// Reward credited to the pool for a completed task.
///
/// The single source of truth for reward computation; `rate` always comes
/// from `ProcessorConfig::reward_rate`.
pub fn reward_for(cost_credits: Decimal, rate: Decimal) -> Decimal {
    cost_credits * rate
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn default_vault_is_zeroed() {
        let vault = VaultAggregate::default();
        assert_eq!(vault.total_locked_stake, Decimal::ZERO);
        assert_eq!(vault.total_credits_issued, Decimal::ZERO);
        assert_eq!(vault.total_tasks_executed, 0);
        assert_eq!(vault.reward_pool, Decimal::ZERO);
    }

    #[test]
    fn reward_is_cost_times_rate() {
        assert_eq!(reward_for(dec!(100), dec!(0.05)), dec!(5.00));
        assert_eq!(reward_for(dec!(30), dec!(0.05)), dec!(1.50));
        assert_eq!(reward_for(dec!(0), dec!(0.05)), dec!(0));
    }
}
