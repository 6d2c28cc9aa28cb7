//! Latest snapshot of every data class, one `watch` channel each.
//!
//! Pollers replace values wholesale and then call [`Shared::touch`] (value
//! changed) or [`Shared::touch_inputs`] (a value other pollers key their
//! reads on changed). The deriver recomputes on every touch.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use delay_chain::{assemble_config, CollateralMeta, ProtocolBase};
use delay_engine::Joined;
use delay_types::{Address, AirlineChainInfo, Amount, Catalog, CatalogRow, OnChainFlightState, PolicyStatus, ProtocolConfig};
use tokio::sync::watch;

use crate::dashboard::Dashboard;

/// The latest successfully fetched catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    /// Bumped whenever the catalog content changes.
    pub epoch: u64,
    pub catalog: Option<Catalog>,
    pub rows: Vec<CatalogRow>,
}

impl CatalogSnapshot {
    pub fn airline_ids(&self) -> Vec<String> {
        self.catalog.as_ref().map(Catalog::airline_ids).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolSnapshot {
    pub base: Option<ProtocolBase>,
    pub meta: Option<CollateralMeta>,
}

impl ProtocolSnapshot {
    /// Present only when both batches of the current cycle succeeded.
    pub fn config(&self) -> Option<ProtocolConfig> {
        assemble_config(self.base.as_ref()?, self.meta.as_ref()?)
    }

    /// Collateral token that account-scoped token reads are made against.
    pub fn collateral(&self) -> Option<Address> {
        self.config().map(|c| c.collateral_token)
    }
}

/// A read made on behalf of `owner` against `collateral`. Values whose
/// scope no longer matches the session are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoped<T> {
    pub owner: Address,
    pub collateral: Option<Address>,
    pub value: T,
}

impl<T> Scoped<T> {
    pub fn matches(&self, owner: Option<Address>, collateral: Option<Address>) -> bool {
        Some(self.owner) == owner && self.collateral == collateral
    }
}

pub type ScopedAmounts = Option<Scoped<BTreeMap<String, Amount>>>;

pub struct Shared {
    pub(crate) catalog: watch::Sender<Arc<CatalogSnapshot>>,
    pub(crate) protocol: watch::Sender<ProtocolSnapshot>,
    pub(crate) flights: watch::Sender<Arc<Joined<OnChainFlightState>>>,
    pub(crate) policies: watch::Sender<Option<Scoped<Arc<Joined<PolicyStatus>>>>>,
    pub(crate) airlines: watch::Sender<Arc<BTreeMap<String, AirlineChainInfo>>>,
    pub(crate) policy_allowance: watch::Sender<Option<Scoped<Amount>>>,
    pub(crate) collateral_balance: watch::Sender<Option<Scoped<Amount>>>,
    pub(crate) vault_allowances: watch::Sender<ScopedAmounts>,
    pub(crate) staked_balances: watch::Sender<ScopedAmounts>,
    pub(crate) claimable_rewards: watch::Sender<ScopedAmounts>,
    pub(crate) session: watch::Sender<Option<Address>>,
    pub(crate) clock: watch::Sender<u64>,
    generation: watch::Sender<u64>,
    inputs: watch::Sender<u64>,
    pub(crate) dashboard: watch::Sender<Arc<Dashboard>>,
    /// Held across derive and publish so dashboards land in read order.
    publish: Mutex<()>,
}

impl Shared {
    pub fn new(now: u64) -> Self {
        Self {
            catalog: watch::Sender::new(Arc::default()),
            protocol: watch::Sender::new(ProtocolSnapshot::default()),
            flights: watch::Sender::new(Arc::default()),
            policies: watch::Sender::new(None),
            airlines: watch::Sender::new(Arc::default()),
            policy_allowance: watch::Sender::new(None),
            collateral_balance: watch::Sender::new(None),
            vault_allowances: watch::Sender::new(None),
            staked_balances: watch::Sender::new(None),
            claimable_rewards: watch::Sender::new(None),
            session: watch::Sender::new(None),
            clock: watch::Sender::new(now),
            generation: watch::Sender::new(0),
            inputs: watch::Sender::new(0),
            dashboard: watch::Sender::new(Arc::new(Dashboard::empty(now))),
            publish: Mutex::new(()),
        }
    }

    /// Some snapshot changed; derived state is out of date.
    pub(crate) fn touch(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    /// A poll input changed; dependent pollers refresh now instead of at
    /// their next tick.
    pub(crate) fn touch_inputs(&self) {
        self.inputs.send_modify(|g| *g = g.wrapping_add(1));
        self.touch();
    }

    pub(crate) fn subscribe_generation(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    pub(crate) fn subscribe_inputs(&self) -> watch::Receiver<u64> {
        self.inputs.subscribe()
    }

    pub fn session(&self) -> Option<Address> {
        *self.session.borrow()
    }

    /// Switches the connected account. Returns whether it changed.
    pub fn set_session(&self, address: Option<Address>) -> bool {
        let changed = self.session.send_if_modified(|current| {
            if *current == address {
                return false;
            }
            *current = address;
            true
        });
        if changed {
            self.touch_inputs();
        }
        changed
    }

    pub fn catalog(&self) -> Arc<CatalogSnapshot> {
        self.catalog.borrow().clone()
    }

    pub fn config(&self) -> Option<ProtocolConfig> {
        self.protocol.borrow().config()
    }

    /// Derives and publishes the dashboard from the current snapshots.
    pub fn rederive(&self) {
        let _publishing = self.publish.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.dashboard.send_replace(Arc::new(crate::dashboard::derive(self)));
    }

    pub fn dashboard(&self) -> Arc<Dashboard> {
        self.dashboard.borrow().clone()
    }

    pub fn subscribe_dashboard(&self) -> watch::Receiver<Arc<Dashboard>> {
        self.dashboard.subscribe()
    }
}
