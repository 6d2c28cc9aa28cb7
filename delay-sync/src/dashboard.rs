use std::collections::BTreeMap;
use std::sync::Arc;

use delay_crypto::normalize;
use delay_engine::{
    buyer_view, provider_decision, provider_view, BuyerContext, BuyerSnapshot, BuyerView, Joined, ProviderDecision,
    ProviderInputs, ProviderView,
};
use delay_types::{Address, Airline, AirlineChainInfo, Amount, ProtocolConfig, ProviderPosition};
use serde::Serialize;
use tokio::sync::watch;

use crate::shared::{Scoped, Shared};

/// Everything the presentation layer renders, derived from one consistent
/// read of all snapshots and the clock.
#[derive(Serialize, Debug, Clone)]
pub struct Dashboard {
    pub now: u64,
    pub session: Option<Address>,
    pub catalog_loaded: bool,
    pub config: Option<ProtocolConfig>,
    pub buyer: BuyerView,
    pub provider: ProviderView,
    pub airline_infos: BTreeMap<String, AirlineChainInfo>,
    pub positions: BTreeMap<String, ProviderPosition>,
}

impl Dashboard {
    pub fn empty(now: u64) -> Self {
        let flights = Joined::default();
        let buyer = buyer_view(
            &BuyerSnapshot {
                rows: &[],
                flights: &flights,
                policies: None,
                config: None,
                buyer: BuyerContext::default(),
                collateral_balance: None,
            },
            now,
        );
        Self {
            now,
            session: None,
            catalog_loaded: false,
            config: None,
            buyer,
            provider: provider_view(&[], &BTreeMap::new(), &BTreeMap::new(), None, false),
            airline_infos: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Provider actions for one catalog airline given raw input strings.
    /// `None` if the airline is not in the catalog.
    pub fn provider_decision(&self, airline_id: &str, inputs: ProviderInputs<'_>) -> Option<ProviderDecision> {
        let key = normalize(airline_id);
        if !self.provider.airlines.iter().any(|card| normalize(&card.airline_id) == key) {
            return None;
        }
        let position = self.positions.get(&key).copied().unwrap_or_default();
        Some(provider_decision(
            self.config.as_ref(),
            self.airline_infos.get(&key),
            &position,
            self.session.is_some(),
            inputs,
        ))
    }
}

fn current<T: Clone>(
    channel: &watch::Sender<Option<Scoped<T>>>,
    owner: Option<Address>,
    collateral: Option<Address>,
) -> Option<T> {
    channel
        .borrow()
        .as_ref()
        .filter(|scoped| scoped.matches(owner, collateral))
        .map(|scoped| scoped.value.clone())
}

fn amount_of(map: &Option<BTreeMap<String, Amount>>, key: &str) -> Option<Amount> {
    map.as_ref().and_then(|m| m.get(key).copied())
}

/// Derives the dashboard from the current snapshots.
pub fn derive(shared: &Shared) -> Dashboard {
    let now = *shared.clock.borrow();
    let session = *shared.session.borrow();
    let catalog = shared.catalog.borrow().clone();
    let config = shared.protocol.borrow().config();
    let collateral = config.as_ref().map(|c| c.collateral_token);
    let flights = shared.flights.borrow().clone();
    let policies = current(&shared.policies, session, None);

    let buyer = buyer_view(
        &BuyerSnapshot {
            rows: &catalog.rows,
            flights: &flights,
            policies: policies.as_deref(),
            config: config.as_ref(),
            buyer: BuyerContext {
                wallet_connected: session.is_some(),
                policy_allowance: current(&shared.policy_allowance, session, collateral),
            },
            collateral_balance: current(&shared.collateral_balance, session, collateral),
        },
        now,
    );

    let infos: BTreeMap<String, AirlineChainInfo> = (**shared.airlines.borrow()).clone();
    let vault_allowances = current(&shared.vault_allowances, session, collateral);
    let staked = current(&shared.staked_balances, session, collateral);
    let rewards = current(&shared.claimable_rewards, session, collateral);
    let positions: BTreeMap<String, ProviderPosition> = infos
        .keys()
        .map(|key| {
            let position = ProviderPosition {
                vault_allowance: amount_of(&vault_allowances, key),
                staked_balance: amount_of(&staked, key),
                claimable_rewards: amount_of(&rewards, key),
            };
            (key.clone(), position)
        })
        .collect();

    let airlines: Vec<Airline> = catalog
        .catalog
        .iter()
        .flat_map(|c| c.airlines.iter().map(|entry| entry.airline.clone()))
        .collect();
    let provider = provider_view(&airlines, &infos, &positions, config.as_ref(), session.is_some());

    Dashboard {
        now,
        session,
        catalog_loaded: catalog.catalog.is_some(),
        config,
        buyer,
        provider,
        airline_infos: infos,
        positions,
    }
}

/// Recomputes the dashboard whenever any snapshot or the clock changes.
pub async fn run_deriver(shared: Arc<Shared>) {
    let mut generation = shared.subscribe_generation();
    loop {
        shared.rederive();
        if generation.changed().await.is_err() {
            break;
        }
    }
}
