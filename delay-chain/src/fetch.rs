//! Batched reads turned into engine inputs.
//!
//! Every fetcher issues exactly one batch. `Err` means the batch itself did
//! not complete; individual call failures come back inside the result.

use std::collections::BTreeMap;

use delay_crypto::{chain_key, join_key, normalize, JoinKey};
use delay_engine::{join, Joined};
use delay_types::{
    Address, AirlineChainInfo, Amount, CatalogRow, OnChainFlightState, PolicyStatus, ProtocolConfig, ReadOutcome,
};

use crate::abi::AbiError;
use crate::calls::{self, Erc20, FlightDelays};
use crate::error::{ChainError, ConfigUnavailable};
use crate::reader::{CallOutcome, ChainReader, ContractCall};

/// The six values read from the policy contract itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolBase {
    pub policy_premium: Amount,
    pub policy_payout: Amount,
    pub policy_window_seconds: u64,
    pub delay_window_seconds: u64,
    pub collateral_token: Address,
    pub network: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollateralMeta {
    pub token: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Combines the two config batches. `None` when the metadata belongs to a
/// different collateral token than the base currently names.
pub fn assemble_config(base: &ProtocolBase, meta: &CollateralMeta) -> Option<ProtocolConfig> {
    if meta.token != base.collateral_token {
        return None;
    }
    Some(ProtocolConfig {
        policy_premium: base.policy_premium,
        policy_payout: base.policy_payout,
        policy_window_seconds: base.policy_window_seconds,
        delay_window_seconds: base.delay_window_seconds,
        collateral_token: base.collateral_token,
        collateral_symbol: meta.symbol.clone(),
        collateral_decimals: meta.decimals,
        network: base.network,
    })
}

fn field<T>(
    outcome: Option<CallOutcome>,
    field: &'static str,
    decode: impl FnOnce(&[u8]) -> Result<T, AbiError>,
) -> Result<T, ConfigUnavailable> {
    match outcome {
        Some(ReadOutcome::Ok(data)) => decode(&data).map_err(|source| ConfigUnavailable::Decode { field, source }),
        Some(ReadOutcome::Failed(reason)) => Err(ConfigUnavailable::Read { field, reason }),
        Some(ReadOutcome::Unknown) | None => Err(ConfigUnavailable::Read { field, reason: "no result".into() }),
    }
}

/// All six base values, or nothing.
pub async fn fetch_protocol_base<R: ChainReader + ?Sized>(
    reader: &R,
    contract: &FlightDelays,
) -> Result<ProtocolBase, ConfigUnavailable> {
    let calls = [
        contract.policy_premium(),
        contract.policy_payout(),
        contract.policy_window(),
        contract.delay_window(),
        contract.collateral(),
        contract.network(),
    ];
    let mut outcomes = reader.read_batch(&calls).await?.into_iter();
    Ok(ProtocolBase {
        policy_premium: field(outcomes.next(), "policyPremium", calls::decode_uint)?,
        policy_payout: field(outcomes.next(), "policyPayout", calls::decode_uint)?,
        policy_window_seconds: field(outcomes.next(), "policyWindow", calls::decode_u64)?,
        delay_window_seconds: field(outcomes.next(), "delayWindow", calls::decode_u64)?,
        collateral_token: field(outcomes.next(), "collateral", calls::decode_address)?,
        network: field(outcomes.next(), "NETWORK", calls::decode_address)?,
    })
}

pub async fn fetch_collateral_meta<R: ChainReader + ?Sized>(
    reader: &R,
    token: Address,
) -> Result<CollateralMeta, ConfigUnavailable> {
    let erc20 = Erc20::new(token);
    let mut outcomes = reader.read_batch(&[erc20.symbol(), erc20.decimals()]).await?.into_iter();
    Ok(CollateralMeta {
        token,
        symbol: field(outcomes.next(), "symbol", calls::decode_string)?,
        decimals: field(outcomes.next(), "decimals", calls::decode_u8)?,
    })
}

/// Base batch, then the collateral batch keyed off its result.
pub async fn fetch_protocol_config<R: ChainReader + ?Sized>(
    reader: &R,
    contract: &FlightDelays,
) -> Result<ProtocolConfig, ConfigUnavailable> {
    let base = fetch_protocol_base(reader, contract).await?;
    let meta = fetch_collateral_meta(reader, base.collateral_token).await?;
    assemble_config(&base, &meta).ok_or(ConfigUnavailable::Read {
        field: "collateral",
        reason: "collateral token changed between batches".into(),
    })
}

fn row_keys(rows: &[CatalogRow]) -> Vec<JoinKey> {
    rows.iter().map(|row| join_key(&row.identity)).collect()
}

/// On-chain state for every catalog row, keyed by join key.
pub async fn fetch_flight_states<R: ChainReader + ?Sized>(
    reader: &R,
    contract: &FlightDelays,
    rows: &[CatalogRow],
) -> Result<Joined<OnChainFlightState>, ChainError> {
    let calls: Vec<ContractCall> = rows
        .iter()
        .map(|row| contract.flights(chain_key(&row.identity.airline_id), chain_key(&row.identity.flight_id)))
        .collect();
    let outcomes = reader.read_batch(&calls).await?;
    let decoded = outcomes.into_iter().map(|o| o.and_then(|data| calls::decode_flight(&data))).collect();
    Ok(join(&row_keys(rows), decoded))
}

/// `buyer`'s policy for every catalog row, keyed by join key.
pub async fn fetch_policy_states<R: ChainReader + ?Sized>(
    reader: &R,
    contract: &FlightDelays,
    rows: &[CatalogRow],
    buyer: Address,
) -> Result<Joined<PolicyStatus>, ChainError> {
    let calls: Vec<ContractCall> = rows
        .iter()
        .map(|row| {
            contract.policies(chain_key(&row.identity.airline_id), chain_key(&row.identity.flight_id), buyer)
        })
        .collect();
    let outcomes = reader.read_batch(&calls).await?;
    let decoded = outcomes.into_iter().map(|o| o.and_then(|data| calls::decode_policy(&data))).collect();
    Ok(join(&row_keys(rows), decoded))
}

/// Outcome of one airline resolution pass, keyed by normalized airline id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AirlineResolution {
    pub resolved: BTreeMap<String, AirlineChainInfo>,
    /// Read succeeded but the airline has no vault yet.
    pub unregistered: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

pub async fn resolve_airlines<R: ChainReader + ?Sized>(
    reader: &R,
    contract: &FlightDelays,
    airline_ids: &[String],
) -> Result<AirlineResolution, ChainError> {
    let keys: Vec<String> = airline_ids.iter().map(|id| normalize(id)).collect();
    let calls: Vec<ContractCall> = keys.iter().map(|key| contract.airlines(chain_key(key))).collect();
    let outcomes = reader.read_batch(&calls).await?;

    let mut resolution = AirlineResolution::default();
    for (key, outcome) in keys.into_iter().zip(outcomes) {
        match outcome.and_then(|data| calls::decode_airline(&data)) {
            ReadOutcome::Ok(Some(info)) => {
                resolution.resolved.insert(key, info);
            }
            ReadOutcome::Ok(None) => resolution.unregistered.push(key),
            ReadOutcome::Failed(reason) => {
                resolution.failed.insert(key, reason);
            }
            ReadOutcome::Unknown => {}
        }
    }
    Ok(resolution)
}

/// One uint read per resolved airline.
async fn per_airline<R: ChainReader + ?Sized>(
    reader: &R,
    infos: &BTreeMap<String, AirlineChainInfo>,
    build: impl Fn(&AirlineChainInfo) -> ContractCall,
) -> Result<BTreeMap<String, ReadOutcome<Amount>>, ChainError> {
    let calls: Vec<ContractCall> = infos.values().map(build).collect();
    let outcomes = reader.read_batch(&calls).await?;
    Ok(infos
        .keys()
        .cloned()
        .zip(outcomes)
        .map(|(key, outcome)| (key, outcome.and_then(|data| calls::decode_uint(&data))))
        .collect())
}

/// Collateral allowance `owner` granted to each airline's vault.
pub async fn fetch_vault_allowances<R: ChainReader + ?Sized>(
    reader: &R,
    collateral: Address,
    owner: Address,
    infos: &BTreeMap<String, AirlineChainInfo>,
) -> Result<BTreeMap<String, ReadOutcome<Amount>>, ChainError> {
    let token = Erc20::new(collateral);
    per_airline(reader, infos, |info| token.allowance(owner, info.vault)).await
}

pub async fn fetch_staked_balances<R: ChainReader + ?Sized>(
    reader: &R,
    owner: Address,
    infos: &BTreeMap<String, AirlineChainInfo>,
) -> Result<BTreeMap<String, ReadOutcome<Amount>>, ChainError> {
    per_airline(reader, infos, |info| calls::active_balance_of(info.vault, owner)).await
}

pub async fn fetch_claimable_rewards<R: ChainReader + ?Sized>(
    reader: &R,
    config: &ProtocolConfig,
    owner: Address,
    infos: &BTreeMap<String, AirlineChainInfo>,
    max_rewards: u64,
) -> Result<BTreeMap<String, ReadOutcome<Amount>>, ChainError> {
    per_airline(reader, infos, |info| {
        calls::claimable(info.rewards, config.collateral_token, owner, config.network, max_rewards)
    })
    .await
}

async fn read_amount<R: ChainReader + ?Sized>(reader: &R, call: ContractCall) -> Result<ReadOutcome<Amount>, ChainError> {
    let outcome = reader.read_batch(std::slice::from_ref(&call)).await?.into_iter().next().unwrap_or_default();
    Ok(outcome.and_then(|data| calls::decode_uint(&data)))
}

/// Collateral allowance `owner` granted to the policy contract.
pub async fn fetch_policy_allowance<R: ChainReader + ?Sized>(
    reader: &R,
    contract: &FlightDelays,
    collateral: Address,
    owner: Address,
) -> Result<ReadOutcome<Amount>, ChainError> {
    read_amount(reader, Erc20::new(collateral).allowance(owner, contract.address)).await
}

pub async fn fetch_collateral_balance<R: ChainReader + ?Sized>(
    reader: &R,
    collateral: Address,
    owner: Address,
) -> Result<ReadOutcome<Amount>, ChainError> {
    read_amount(reader, Erc20::new(collateral).balance_of(owner)).await
}
