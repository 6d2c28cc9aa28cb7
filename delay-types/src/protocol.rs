use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::{self, Amount};

/// Placeholder symbol for display while the collateral token is unresolved.
pub const DISPLAY_SYMBOL: &str = "TOKEN";
/// Decimal count assumed for display only; never used for decisions.
pub const DISPLAY_DECIMALS: u8 = 18;

/// Snapshot of the policy contract's configuration plus collateral metadata.
///
/// Only ever built from a complete pair of successful reads; there is no
/// partially populated state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    #[serde(with = "amount")]
    pub policy_premium: Amount,
    #[serde(with = "amount")]
    pub policy_payout: Amount,
    /// Seconds before departure at which purchasing opens.
    pub policy_window_seconds: u64,
    /// Seconds before departure at which purchasing closes.
    pub delay_window_seconds: u64,
    pub collateral_token: Address,
    pub collateral_symbol: String,
    pub collateral_decimals: u8,
    pub network: Address,
}
