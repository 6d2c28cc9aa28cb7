//! One poller per data class. Each `refresh` issues its reads, then checks
//! that the inputs it read with are still current before publishing; a
//! completion whose inputs were superseded is dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use delay_chain::{
    fetch_claimable_rewards, fetch_collateral_balance, fetch_collateral_meta, fetch_flight_states,
    fetch_policy_allowance, fetch_policy_states, fetch_protocol_base, fetch_staked_balances, fetch_vault_allowances,
    resolve_airlines, ChainError, ChainReader, FlightDelays,
};
use delay_crypto::normalize;
use delay_engine::provider::DEFAULT_REWARD_BATCHES;
use delay_types::{Address, Amount, ReadOutcome};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::shared::{CatalogSnapshot, Scoped, ScopedAmounts, Shared};
use crate::source::CatalogSource;

/// Runs `refresh` every `every`, and also right away whenever `wake` fires.
pub(crate) async fn poll_every<F, Fut>(every: Duration, mut wake: Option<watch::Receiver<u64>>, mut refresh: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        match wake.as_mut() {
            Some(wake) => {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = wake.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            None => {
                ticker.tick().await;
            }
        }
        refresh().await;
    }
}

pub struct CatalogPoller {
    pub(crate) shared: Arc<Shared>,
    pub(crate) source: Arc<dyn CatalogSource>,
}

impl CatalogPoller {
    pub async fn refresh(&self) {
        let catalog = match self.source.fetch_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "catalog refresh failed, keeping previous catalog");
                return;
            }
        };
        let (rows, rejected) = catalog.rows();
        for error in &rejected {
            warn!(%error, "skipping catalog entry");
        }
        let row_count = rows.len();
        let changed = self.shared.catalog.send_if_modified(|snapshot| {
            if snapshot.catalog.as_ref() == Some(&catalog) {
                return false;
            }
            *snapshot = Arc::new(CatalogSnapshot { epoch: snapshot.epoch + 1, catalog: Some(catalog), rows });
            true
        });
        if changed {
            debug!(epoch = self.shared.catalog().epoch, rows = row_count, "catalog updated");
            self.shared.touch_inputs();
        } else {
            debug!(rows = row_count, "catalog unchanged");
        }
    }
}

pub struct ProtocolPoller {
    pub(crate) shared: Arc<Shared>,
    pub(crate) reader: Arc<dyn ChainReader>,
    pub(crate) contract: FlightDelays,
}

impl ProtocolPoller {
    fn config_ready(&self) -> bool {
        self.shared.protocol.borrow().config().is_some()
    }

    /// Touches dependents if config availability or its collateral changed.
    fn after_update(&self, before: Option<Address>, was_ready: bool) {
        let after = self.shared.protocol.borrow().collateral();
        if before != after || was_ready != self.config_ready() {
            self.shared.touch_inputs();
        } else {
            self.shared.touch();
        }
    }

    pub async fn refresh_base(&self) {
        let before = self.shared.protocol.borrow().collateral();
        let was_ready = self.config_ready();
        match fetch_protocol_base(&*self.reader, &self.contract).await {
            Ok(base) => {
                let token = base.collateral_token;
                let changed = self.shared.protocol.send_if_modified(|p| {
                    if p.base.as_ref() == Some(&base) {
                        return false;
                    }
                    p.base = Some(base);
                    true
                });
                let meta_stale = self.shared.protocol.borrow().meta.as_ref().map(|m| m.token) != Some(token);
                if meta_stale {
                    self.refresh_meta().await;
                }
                if changed {
                    debug!(collateral = %token, "protocol configuration updated");
                    self.after_update(before, was_ready);
                }
            }
            Err(e) => {
                warn!(error = %e, "protocol configuration unavailable");
                if self.shared.protocol.send_if_modified(|p| p.base.take().is_some()) {
                    self.after_update(before, was_ready);
                }
            }
        }
    }

    pub async fn refresh_meta(&self) {
        let token = self.shared.protocol.borrow().base.as_ref().map(|b| b.collateral_token);
        let Some(token) = token else {
            return;
        };
        let before = self.shared.protocol.borrow().collateral();
        let was_ready = self.config_ready();
        let result = fetch_collateral_meta(&*self.reader, token).await;
        let current = self.shared.protocol.borrow().base.as_ref().map(|b| b.collateral_token);
        if current != Some(token) {
            debug!(collateral = %token, "discarding metadata for superseded collateral token");
            return;
        }
        let changed = match result {
            Ok(meta) => self.shared.protocol.send_if_modified(|p| {
                if p.meta.as_ref() == Some(&meta) {
                    return false;
                }
                p.meta = Some(meta);
                true
            }),
            Err(e) => {
                warn!(error = %e, collateral = %token, "collateral metadata unavailable");
                self.shared.protocol.send_if_modified(|p| p.meta.take().is_some())
            }
        };
        if changed {
            self.after_update(before, was_ready);
        }
    }

    pub(crate) async fn run(self, base_every: Duration, meta_every: Duration) {
        let mut base_tick = tokio::time::interval(base_every);
        let mut meta_tick = tokio::time::interval(meta_every);
        base_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        meta_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first meta tick fires immediately; the base read triggers its own.
        meta_tick.tick().await;
        loop {
            tokio::select! {
                _ = base_tick.tick() => self.refresh_base().await,
                _ = meta_tick.tick() => self.refresh_meta().await,
            }
        }
    }
}

pub struct FlightsPoller {
    pub(crate) shared: Arc<Shared>,
    pub(crate) reader: Arc<dyn ChainReader>,
    pub(crate) contract: FlightDelays,
}

impl FlightsPoller {
    pub async fn refresh(&self) {
        let snapshot = self.shared.catalog();
        if snapshot.catalog.is_none() {
            return;
        }
        let joined = match fetch_flight_states(&*self.reader, &self.contract, &snapshot.rows).await {
            Ok(joined) => joined,
            Err(e) => {
                warn!(error = %e, "flight state batch failed");
                return;
            }
        };
        if self.shared.catalog().epoch != snapshot.epoch {
            debug!(epoch = snapshot.epoch, "discarding flight states for superseded catalog");
            return;
        }
        if !joined.failed.is_empty() {
            warn!(failed = joined.failed.len(), ok = joined.len(), "some flight state reads failed");
        }
        debug!(flights = joined.len(), "flight states refreshed");
        self.shared.flights.send_replace(Arc::new(joined));
        self.shared.touch();
    }
}

pub struct PoliciesPoller {
    pub(crate) shared: Arc<Shared>,
    pub(crate) reader: Arc<dyn ChainReader>,
    pub(crate) contract: FlightDelays,
}

impl PoliciesPoller {
    pub async fn refresh(&self) {
        let snapshot = self.shared.catalog();
        let Some(buyer) = self.shared.session() else {
            if self.shared.policies.send_if_modified(|p| p.take().is_some()) {
                self.shared.touch();
            }
            return;
        };
        if snapshot.catalog.is_none() {
            return;
        }
        let joined = match fetch_policy_states(&*self.reader, &self.contract, &snapshot.rows, buyer).await {
            Ok(joined) => joined,
            Err(e) => {
                warn!(error = %e, %buyer, "policy state batch failed");
                return;
            }
        };
        if self.shared.catalog().epoch != snapshot.epoch || self.shared.session() != Some(buyer) {
            debug!(epoch = snapshot.epoch, %buyer, "discarding superseded policy states");
            return;
        }
        if !joined.failed.is_empty() {
            warn!(failed = joined.failed.len(), ok = joined.len(), "some policy reads failed");
        }
        self.shared
            .policies
            .send_replace(Some(Scoped { owner: buyer, collateral: None, value: Arc::new(joined) }));
        self.shared.touch();
    }
}

/// Resolves vault and rewards addresses of catalog airlines. Resolved
/// airlines are cached for the life of the process and never re-read.
pub struct AirlinesPoller {
    pub(crate) shared: Arc<Shared>,
    pub(crate) reader: Arc<dyn ChainReader>,
    pub(crate) contract: FlightDelays,
}

impl AirlinesPoller {
    pub async fn refresh(&self) {
        let resolved = self.shared.airlines.borrow().clone();
        let pending: Vec<String> = self
            .shared
            .catalog()
            .airline_ids()
            .iter()
            .map(|id| normalize(id))
            .filter(|id| !resolved.contains_key(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if pending.is_empty() {
            return;
        }
        let resolution = match resolve_airlines(&*self.reader, &self.contract, &pending).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(error = %e, pending = pending.len(), "airline resolution batch failed");
                return;
            }
        };
        for (airline, reason) in &resolution.failed {
            debug!(%airline, %reason, "airline not resolved");
        }
        if !resolution.unregistered.is_empty() {
            debug!(airlines = ?resolution.unregistered, "airlines without a vault");
        }
        if resolution.resolved.is_empty() {
            return;
        }
        debug!(resolved = resolution.resolved.len(), "airlines resolved");
        self.shared.airlines.send_modify(|map| {
            let mut next = (**map).clone();
            next.extend(resolution.resolved);
            *map = Arc::new(next);
        });
        self.shared.touch_inputs();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyerRead {
    PolicyAllowance,
    CollateralBalance,
}

/// Single-value collateral reads for the connected buyer.
fn scope_is(shared: &Shared, owner: Address, token: Address) -> bool {
    let collateral = shared.protocol.borrow().collateral();
    shared.session() == Some(owner) && collateral == Some(token)
}

pub struct BuyerAmountPoller {
    pub(crate) shared: Arc<Shared>,
    pub(crate) reader: Arc<dyn ChainReader>,
    pub(crate) contract: FlightDelays,
    pub(crate) read: BuyerRead,
}

impl BuyerAmountPoller {
    fn channel(&self) -> &watch::Sender<Option<Scoped<Amount>>> {
        match self.read {
            BuyerRead::PolicyAllowance => &self.shared.policy_allowance,
            BuyerRead::CollateralBalance => &self.shared.collateral_balance,
        }
    }

    fn clear(&self) {
        if self.channel().send_if_modified(|v| v.take().is_some()) {
            self.shared.touch();
        }
    }

    pub async fn refresh(&self) {
        let collateral = self.shared.protocol.borrow().collateral();
        let (Some(owner), Some(token)) = (self.shared.session(), collateral) else {
            self.clear();
            return;
        };
        let result = match self.read {
            BuyerRead::PolicyAllowance => fetch_policy_allowance(&*self.reader, &self.contract, token, owner).await,
            BuyerRead::CollateralBalance => fetch_collateral_balance(&*self.reader, token, owner).await,
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, read = ?self.read, "collateral read batch failed");
                return;
            }
        };
        if !scope_is(&self.shared, owner, token) {
            debug!(read = ?self.read, %owner, "discarding superseded collateral read");
            return;
        }
        match outcome {
            ReadOutcome::Ok(value) => {
                self.channel().send_replace(Some(Scoped { owner, collateral: Some(token), value }));
                self.shared.touch();
            }
            ReadOutcome::Failed(reason) => {
                debug!(read = ?self.read, %reason, "collateral read failed");
                self.clear();
            }
            ReadOutcome::Unknown => self.clear(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRead {
    VaultAllowance,
    StakedBalance,
    ClaimableRewards,
}

/// One per-airline read for the connected provider across every resolved
/// airline. Failed items are left out of the published map.
pub struct ProviderPoller {
    pub(crate) shared: Arc<Shared>,
    pub(crate) reader: Arc<dyn ChainReader>,
    pub(crate) read: ProviderRead,
}

impl ProviderPoller {
    fn channel(&self) -> &watch::Sender<ScopedAmounts> {
        match self.read {
            ProviderRead::VaultAllowance => &self.shared.vault_allowances,
            ProviderRead::StakedBalance => &self.shared.staked_balances,
            ProviderRead::ClaimableRewards => &self.shared.claimable_rewards,
        }
    }

    pub async fn refresh(&self) {
        let config = self.shared.config();
        let (Some(owner), Some(config)) = (self.shared.session(), config) else {
            if self.channel().send_if_modified(|v| v.take().is_some()) {
                self.shared.touch();
            }
            return;
        };
        let infos = self.shared.airlines.borrow().clone();
        if infos.is_empty() {
            return;
        }
        let token = config.collateral_token;
        let result: Result<BTreeMap<String, ReadOutcome<Amount>>, ChainError> = match self.read {
            ProviderRead::VaultAllowance => fetch_vault_allowances(&*self.reader, token, owner, &infos).await,
            ProviderRead::StakedBalance => fetch_staked_balances(&*self.reader, owner, &infos).await,
            ProviderRead::ClaimableRewards => {
                fetch_claimable_rewards(&*self.reader, &config, owner, &infos, DEFAULT_REWARD_BATCHES).await
            }
        };
        let outcomes = match result {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(error = %e, read = ?self.read, "provider read batch failed");
                return;
            }
        };
        if !scope_is(&self.shared, owner, token) {
            debug!(read = ?self.read, %owner, "discarding superseded provider reads");
            return;
        }
        let mut values = BTreeMap::new();
        let mut failed = 0usize;
        for (airline, outcome) in outcomes {
            match outcome {
                ReadOutcome::Ok(value) => {
                    values.insert(airline, value);
                }
                ReadOutcome::Failed(reason) => {
                    debug!(read = ?self.read, %airline, %reason, "provider read failed");
                    failed += 1;
                }
                ReadOutcome::Unknown => {}
            }
        }
        if failed > 0 {
            warn!(read = ?self.read, failed, ok = values.len(), "some provider reads failed");
        }
        self.channel().send_replace(Some(Scoped { owner, collateral: Some(token), value: values }));
        self.shared.touch();
    }
}

/// Publishes wall-clock seconds; independent of every network poll.
pub(crate) async fn run_clock(shared: Arc<Shared>, every: Duration, now: Arc<dyn Fn() -> u64 + Send + Sync>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let t = now();
        let changed = shared.clock.send_if_modified(|current| {
            if *current == t {
                return false;
            }
            *current = t;
            true
        });
        if changed {
            shared.touch();
        }
    }
}
