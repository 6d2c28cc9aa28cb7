//! Keeps every data class fresh on its own cadence and re-derives the
//! dashboard whenever any of them, or the clock, changes.

pub mod dashboard;
pub mod intervals;
pub mod pollers;
pub mod shared;
pub mod source;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use delay_chain::{ChainReader, FlightDelays};
use delay_types::Address;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub use dashboard::{derive, Dashboard};
pub use intervals::PollIntervals;
pub use pollers::{BuyerRead, ProviderRead};
pub use shared::{CatalogSnapshot, ProtocolSnapshot, Scoped, Shared};
pub use source::CatalogSource;

use pollers::{
    poll_every, run_clock, AirlinesPoller, BuyerAmountPoller, CatalogPoller, FlightsPoller, PoliciesPoller,
    ProtocolPoller, ProviderPoller,
};

pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub struct SyncEngine {
    reader: Arc<dyn ChainReader>,
    source: Arc<dyn CatalogSource>,
    contract: FlightDelays,
    intervals: PollIntervals,
    clock: Clock,
    session: Option<Address>,
}

impl SyncEngine {
    pub fn new(reader: Arc<dyn ChainReader>, source: Arc<dyn CatalogSource>, contract: FlightDelays) -> Self {
        Self {
            reader,
            source,
            contract,
            intervals: PollIntervals::default(),
            clock: Arc::new(unix_now),
            session: None,
        }
    }

    pub fn with_intervals(mut self, intervals: PollIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_session(mut self, session: Option<Address>) -> Self {
        self.session = session;
        self
    }

    /// Starts every poller, the clock and the deriver on the current runtime.
    pub fn spawn(self) -> SyncHandle {
        let shared = Arc::new(Shared::new((self.clock)()));
        shared.set_session(self.session);
        let iv = self.intervals;
        let mut tasks = Vec::new();

        let catalog = CatalogPoller { shared: shared.clone(), source: self.source.clone() };
        tasks.push(tokio::spawn(async move {
            let p = &catalog;
            poll_every(iv.catalog, None, move || p.refresh()).await
        }));

        let protocol = ProtocolPoller { shared: shared.clone(), reader: self.reader.clone(), contract: self.contract };
        tasks.push(tokio::spawn(protocol.run(iv.protocol_base, iv.collateral_meta)));

        let flights = FlightsPoller { shared: shared.clone(), reader: self.reader.clone(), contract: self.contract };
        let wake = Some(shared.subscribe_inputs());
        tasks.push(tokio::spawn(async move {
            let p = &flights;
            poll_every(iv.flights, wake, move || p.refresh()).await
        }));

        let policies = PoliciesPoller { shared: shared.clone(), reader: self.reader.clone(), contract: self.contract };
        let wake = Some(shared.subscribe_inputs());
        tasks.push(tokio::spawn(async move {
            let p = &policies;
            poll_every(iv.policies, wake, move || p.refresh()).await
        }));

        let airlines = AirlinesPoller { shared: shared.clone(), reader: self.reader.clone(), contract: self.contract };
        let wake = Some(shared.subscribe_inputs());
        tasks.push(tokio::spawn(async move {
            let p = &airlines;
            poll_every(iv.airlines, wake, move || p.refresh()).await
        }));

        for (read, every) in [
            (BuyerRead::PolicyAllowance, iv.policy_allowance),
            (BuyerRead::CollateralBalance, iv.collateral_balance),
        ] {
            let poller =
                BuyerAmountPoller { shared: shared.clone(), reader: self.reader.clone(), contract: self.contract, read };
            let wake = Some(shared.subscribe_inputs());
            tasks.push(tokio::spawn(async move {
                let p = &poller;
                poll_every(every, wake, move || p.refresh()).await
            }));
        }

        for (read, every) in [
            (ProviderRead::VaultAllowance, iv.vault_allowance),
            (ProviderRead::StakedBalance, iv.staked_balance),
            (ProviderRead::ClaimableRewards, iv.rewards),
        ] {
            let poller = ProviderPoller { shared: shared.clone(), reader: self.reader.clone(), read };
            let wake = Some(shared.subscribe_inputs());
            tasks.push(tokio::spawn(async move {
                let p = &poller;
                poll_every(every, wake, move || p.refresh()).await
            }));
        }

        tasks.push(tokio::spawn(run_clock(shared.clone(), iv.clock, self.clock.clone())));
        tasks.push(tokio::spawn(dashboard::run_deriver(shared.clone())));

        info!(pollers = tasks.len(), contract = %self.contract.address, "sync engine started");
        SyncHandle { shared, tasks: Arc::new(tasks) }
    }
}

/// Access to a running engine. Cloning shares the same tasks; they stop
/// when [`SyncHandle::shutdown`] is called.
#[derive(Clone)]
pub struct SyncHandle {
    shared: Arc<Shared>,
    tasks: Arc<Vec<JoinHandle<()>>>,
}

impl SyncHandle {
    /// A handle with no pollers running. Snapshots stay empty until
    /// something publishes into them.
    pub fn detached(now: u64) -> Self {
        let shared = Arc::new(Shared::new(now));
        Self { shared, tasks: Arc::new(Vec::new()) }
    }

    pub fn dashboard(&self) -> Arc<Dashboard> {
        self.shared.dashboard()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Dashboard>> {
        self.shared.subscribe_dashboard()
    }

    pub fn session(&self) -> Option<Address> {
        self.shared.session()
    }

    /// Connects `address`, or disconnects with `None`. In-flight reads for
    /// the previous session are discarded when they complete.
    pub fn set_session(&self, address: Option<Address>) -> bool {
        let changed = self.shared.set_session(address);
        if changed {
            self.shared.rederive();
            info!(session = ?address.map(|a| a.to_string()), "session changed");
        }
        changed
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn shutdown(&self) {
        for task in self.tasks.iter() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests;
