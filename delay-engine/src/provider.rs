//! Liquidity-provider allowance and exposure reconciliation.
//!
//! User input strings are passed in by value on every evaluation; the
//! on-chain allowance changes independently, so nothing here is memoized.

use delay_types::{Amount, AirlineChainInfo, ProtocolConfig, ProviderPosition};
use serde::{Deserialize, Serialize};

use crate::units::parse_units;

/// Reward batches claimed when the user leaves the field empty.
pub const DEFAULT_REWARD_BATCHES: u64 = 5;

/// Desired amount in base units. Malformed input counts as zero.
pub fn desired_amount(input: &str, decimals: u8) -> Amount {
    parse_units(input, decimals).unwrap_or(0)
}

/// An unknown allowance never lets a deposit skip approval.
pub fn needs_approval(desired: Amount, allowance: Option<Amount>) -> bool {
    desired > 0 && allowance.map_or(true, |a| a < desired)
}

pub fn reward_batches(input: &str) -> Option<u64> {
    let raw = input.trim();
    if raw.is_empty() {
        return Some(DEFAULT_REWARD_BATCHES);
    }
    raw.parse::<u64>().ok().filter(|n| *n > 0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderInputs<'a> {
    pub deposit: &'a str,
    pub withdraw: &'a str,
    pub max_rewards: &'a str,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDecision {
    #[serde(with = "delay_types::amount")]
    pub desired_deposit: Amount,
    #[serde(with = "delay_types::amount")]
    pub desired_withdraw: Amount,
    pub needs_approval: bool,
    pub approve_enabled: bool,
    pub deposit_enabled: bool,
    pub withdraw_enabled: bool,
    pub reward_batches: Option<u64>,
    pub claim_rewards_enabled: bool,
}

pub fn provider_decision(
    config: Option<&ProtocolConfig>,
    info: Option<&AirlineChainInfo>,
    position: &ProviderPosition,
    wallet_connected: bool,
    inputs: ProviderInputs<'_>,
) -> ProviderDecision {
    let ready = wallet_connected && config.is_some();
    let (desired_deposit, desired_withdraw) = match config {
        Some(config) => (
            desired_amount(inputs.deposit, config.collateral_decimals),
            desired_amount(inputs.withdraw, config.collateral_decimals),
        ),
        None => (0, 0),
    };
    let needs_approval = needs_approval(desired_deposit, position.vault_allowance);
    let vault_ready = ready && info.is_some();
    let reward_batches = reward_batches(inputs.max_rewards);

    ProviderDecision {
        desired_deposit,
        desired_withdraw,
        needs_approval,
        approve_enabled: vault_ready && needs_approval,
        deposit_enabled: vault_ready && desired_deposit > 0 && !needs_approval,
        withdraw_enabled: vault_ready && desired_withdraw > 0,
        reward_batches,
        claim_rewards_enabled: vault_ready && reward_batches.is_some(),
    }
}
