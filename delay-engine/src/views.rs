//! Assembles what the presentation layer renders from the latest snapshots.

use delay_crypto::{join_key, normalize, JoinKey};
use delay_types::{
    Address, Airline, AirlineChainInfo, Amount, ApiFlightStatus, CatalogRow, FlightIdentity, FlightStatus,
    OnChainFlightState, PolicyStatus, ProtocolConfig, ProviderPosition,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::join::Joined;
use crate::window::{allowance_enough, window_state, BuyerContext, FlightInputs, WindowState};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BuyerRow {
    pub key: JoinKey,
    pub identity: FlightIdentity,
    pub airline_name: String,
    pub departure_timestamp: u64,
    pub api_status: ApiFlightStatus,
    /// `None` while the on-chain record is unknown.
    pub chain_status: Option<FlightStatus>,
    pub chain_status_label: String,
    pub policy_status: Option<PolicyStatus>,
    pub policy_label: String,
    #[serde(with = "delay_types::amount::option")]
    pub policies_sold: Option<Amount>,
    pub window: WindowState,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BuyerView {
    pub now: u64,
    pub wallet_connected: bool,
    pub protocol_ready: bool,
    /// Connected, configured, and the policy contract may not yet spend the premium.
    pub approve_collateral: bool,
    #[serde(with = "delay_types::amount::option")]
    pub collateral_balance: Option<Amount>,
    pub rows: Vec<BuyerRow>,
}

pub struct BuyerSnapshot<'a> {
    pub rows: &'a [CatalogRow],
    pub flights: &'a Joined<OnChainFlightState>,
    /// Policies read for the currently connected buyer, if any.
    pub policies: Option<&'a Joined<PolicyStatus>>,
    pub config: Option<&'a ProtocolConfig>,
    pub buyer: BuyerContext,
    pub collateral_balance: Option<Amount>,
}

pub fn buyer_view(snapshot: &BuyerSnapshot<'_>, now: u64) -> BuyerView {
    let rows = snapshot
        .rows
        .iter()
        .map(|row| {
            let key = join_key(&row.identity);
            let chain = snapshot.flights.get(&key);
            let policy = snapshot.policies.and_then(|p| p.get(&key)).copied();
            let window = window_state(
                FlightInputs { chain, policy, catalog_departure: row.departure_timestamp },
                snapshot.config,
                &snapshot.buyer,
                now,
            );
            BuyerRow {
                identity: row.identity.clone(),
                airline_name: row.airline_name.clone(),
                departure_timestamp: row.departure_timestamp,
                api_status: row.status,
                chain_status: chain.map(|c| c.status),
                chain_status_label: chain.map_or("Unknown", |c| c.status.label()).to_string(),
                policy_status: policy,
                policy_label: policy.unwrap_or_default().label().to_string(),
                policies_sold: chain.map(|c| c.policies_sold),
                window,
                key,
            }
        })
        .collect();

    BuyerView {
        now,
        wallet_connected: snapshot.buyer.wallet_connected,
        protocol_ready: snapshot.config.is_some(),
        approve_collateral: snapshot.buyer.wallet_connected
            && snapshot.config.is_some()
            && !allowance_enough(snapshot.config, snapshot.buyer.policy_allowance),
        collateral_balance: snapshot.collateral_balance,
        rows,
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProviderCard {
    pub airline_id: String,
    pub name: String,
    pub vault: Option<Address>,
    pub rewards: Option<Address>,
    pub position: ProviderPosition,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProviderView {
    pub wallet_connected: bool,
    pub protocol_ready: bool,
    pub collateral_symbol: String,
    pub collateral_decimals: u8,
    pub airlines: Vec<ProviderCard>,
}

/// Builds provider cards. `infos` and `positions` are keyed by normalized
/// airline id.
pub fn provider_view(
    airlines: &[Airline],
    infos: &BTreeMap<String, AirlineChainInfo>,
    positions: &BTreeMap<String, ProviderPosition>,
    config: Option<&ProtocolConfig>,
    wallet_connected: bool,
) -> ProviderView {
    let cards = airlines
        .iter()
        .map(|airline| {
            let id = normalize(&airline.airline_id);
            let info = infos.get(&id);
            ProviderCard {
                airline_id: airline.airline_id.clone(),
                name: airline.name.clone(),
                vault: info.map(|i| i.vault),
                rewards: info.map(|i| i.rewards),
                position: positions.get(&id).copied().unwrap_or_default(),
            }
        })
        .collect();

    ProviderView {
        wallet_connected,
        protocol_ready: config.is_some(),
        collateral_symbol: config
            .map_or(delay_types::protocol::DISPLAY_SYMBOL, |c| c.collateral_symbol.as_str())
            .to_string(),
        collateral_decimals: config.map_or(delay_types::protocol::DISPLAY_DECIMALS, |c| c.collateral_decimals),
        airlines: cards,
    }
}
