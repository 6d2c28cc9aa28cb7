use std::time::Duration;

/// Refresh cadence per data class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub catalog: Duration,
    pub protocol_base: Duration,
    pub collateral_meta: Duration,
    pub flights: Duration,
    pub policies: Duration,
    pub airlines: Duration,
    pub policy_allowance: Duration,
    pub vault_allowance: Duration,
    pub staked_balance: Duration,
    pub rewards: Duration,
    pub collateral_balance: Duration,
    pub clock: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            catalog: Duration::from_secs(10),
            protocol_base: Duration::from_secs(15),
            collateral_meta: Duration::from_secs(30),
            flights: Duration::from_secs(6),
            policies: Duration::from_secs(6),
            airlines: Duration::from_secs(12),
            policy_allowance: Duration::from_secs(8),
            vault_allowance: Duration::from_secs(12),
            staked_balance: Duration::from_secs(10),
            rewards: Duration::from_secs(15),
            collateral_balance: Duration::from_secs(12),
            clock: Duration::from_secs(1),
        }
    }
}

impl PollIntervals {
    /// Every network poll at the same cadence; the clock keeps ticking each second.
    pub fn uniform(every: Duration) -> Self {
        Self {
            catalog: every,
            protocol_base: every,
            collateral_meta: every,
            flights: every,
            policies: every,
            airlines: every,
            policy_allowance: every,
            vault_allowance: every,
            staked_balance: every,
            rewards: every,
            collateral_balance: every,
            clock: Duration::from_secs(1),
        }
    }
}
