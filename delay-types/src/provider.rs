use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::{self, Amount};

/// Vault and rewards contracts deployed for one airline.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirlineChainInfo {
    pub vault: Address,
    pub rewards: Address,
}

impl AirlineChainInfo {
    /// Zero addresses mean the airline has no vault yet and must never be
    /// used as a call target.
    pub fn resolved(vault: Address, rewards: Address) -> Option<Self> {
        if vault.is_zero() || rewards.is_zero() {
            return None;
        }
        Some(Self { vault, rewards })
    }
}

/// A provider's position in one airline vault. Each field is read
/// independently; `None` means the latest read failed or has not happened.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderPosition {
    #[serde(default, with = "amount::option")]
    pub vault_allowance: Option<Amount>,
    #[serde(default, with = "amount::option")]
    pub staked_balance: Option<Amount>,
    #[serde(default, with = "amount::option")]
    pub claimable_rewards: Option<Amount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_position_fields_read_as_unknown() {
        let position: ProviderPosition = serde_json::from_str(r#"{"staked_balance":"42"}"#).unwrap();
        assert_eq!(position.staked_balance, Some(42));
        assert_eq!(position.vault_allowance, None);
        assert_eq!(position.claimable_rewards, None);
        assert_eq!(serde_json::from_str::<ProviderPosition>("{}").unwrap(), ProviderPosition::default());
    }
}
