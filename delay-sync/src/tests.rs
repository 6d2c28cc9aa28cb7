use super::*;
use crate::pollers::{
    AirlinesPoller, BuyerAmountPoller, BuyerRead, CatalogPoller, FlightsPoller, PoliciesPoller, ProtocolPoller,
    ProviderPoller, ProviderRead,
};
use async_trait::async_trait;
use delay_chain::abi::{encode, Token};
use delay_chain::calls::{active_balance_of, claimable};
use delay_chain::{CallOutcome, ChainError, ContractCall, Erc20, MemoryReader};
use delay_crypto::{chain_key, join_key};
use delay_engine::provider::DEFAULT_REWARD_BATCHES;
use delay_engine::{Action, Phase, ProviderInputs};
use delay_flights::CatalogError;
use delay_types::{
    Airline, AirlineChainInfo, AirlineWithFlights, ApiFlightStatus, Catalog, CatalogFlight, FlightIdentity, FlightStatus, PolicyStatus,
};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

const POLICY: Address = Address([0xf1; 20]);
const TOKEN: Address = Address([0xc0; 20]);
const NETWORK: Address = Address([0xee; 20]);
const BUYER: Address = Address([0xb0; 20]);
const OTHER: Address = Address([0xb1; 20]);

fn contract() -> FlightDelays {
    FlightDelays::new(POLICY)
}

fn uint(v: u128) -> Vec<u8> {
    encode(&[Token::Uint(v)])
}

fn symbol(s: &str) -> Vec<u8> {
    let mut word = [0u8; 32];
    word[..s.len()].copy_from_slice(s.as_bytes());
    word.to_vec()
}

fn catalog(flights: &[(&str, &str, u64)]) -> Catalog {
    let mut airlines: Vec<AirlineWithFlights> = Vec::new();
    for (airline, flight, departure) in flights {
        let entry = CatalogFlight {
            airline_id: airline.to_string(),
            flight_id: flight.to_string(),
            departure_timestamp: *departure,
            status: ApiFlightStatus::Scheduled,
        };
        match airlines.iter_mut().find(|a| a.airline.airline_id == *airline) {
            Some(existing) => existing.flights.push(entry),
            None => airlines.push(AirlineWithFlights {
                airline: Airline { airline_id: airline.to_string(), name: format!("{airline} Air"), code: airline[..2].to_string() },
                flights: vec![entry],
            }),
        }
    }
    Catalog { airlines }
}

struct FakeCatalog {
    next: Mutex<Option<Catalog>>,
}

impl FakeCatalog {
    fn new(catalog: Option<Catalog>) -> Self {
        Self { next: Mutex::new(catalog) }
    }

    fn set(&self, catalog: Option<Catalog>) {
        *self.next.lock().unwrap() = catalog;
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_catalog(&self) -> Result<Catalog, CatalogError> {
        self.next.lock().unwrap().clone().ok_or(CatalogError::Status {
            endpoint: "/airlines".into(),
            status: 502,
            body: "bad gateway".into(),
        })
    }
}

/// Runs `hook` before every batch, to change inputs while a read is in flight.
struct HookReader {
    inner: MemoryReader,
    hook: Box<dyn Fn() + Send + Sync>,
}

#[async_trait]
impl ChainReader for HookReader {
    async fn read_batch(&self, calls: &[ContractCall]) -> Result<Vec<CallOutcome>, ChainError> {
        (self.hook)();
        self.inner.read_batch(calls).await
    }
}

fn script_config(reader: &MemoryReader, policy_window: u128, delay_window: u128) {
    let c = contract();
    reader.respond(c.policy_premium(), uint(10_000_000));
    reader.respond(c.policy_payout(), uint(100_000_000));
    reader.respond(c.policy_window(), uint(policy_window));
    reader.respond(c.delay_window(), uint(delay_window));
    reader.respond(c.collateral(), encode(&[Token::Address(TOKEN)]));
    reader.respond(c.network(), encode(&[Token::Address(NETWORK)]));
    reader.respond(Erc20::new(TOKEN).symbol(), symbol("USDC"));
    reader.respond(Erc20::new(TOKEN).decimals(), uint(6));
}

fn flight_return(ts: u64, status: u8) -> Vec<u8> {
    encode(&[Token::Uint(ts.into()), Token::Uint(status.into()), Token::Uint(0), Token::FixedBytes([0; 32])])
}

async fn load_catalog(shared: &Arc<Shared>, c: Catalog) {
    let poller = CatalogPoller { shared: shared.clone(), source: Arc::new(FakeCatalog::new(Some(c))) };
    poller.refresh().await;
}

#[tokio::test]
async fn test_catalog_epoch_moves_only_on_change() {
    let shared = Arc::new(Shared::new(0));
    let source = Arc::new(FakeCatalog::new(Some(catalog(&[("ALPHA", "A1", 1_000)]))));
    let poller = CatalogPoller { shared: shared.clone(), source: source.clone() };

    poller.refresh().await;
    poller.refresh().await;
    assert_eq!(shared.catalog().epoch, 1);
    assert_eq!(shared.catalog().rows.len(), 1);

    source.set(Some(catalog(&[("ALPHA", "A1", 1_000), ("ALPHA", "A2", 2_000)])));
    poller.refresh().await;
    assert_eq!(shared.catalog().epoch, 2);

    // A failed refresh keeps the last good catalog.
    source.set(None);
    poller.refresh().await;
    assert_eq!(shared.catalog().epoch, 2);
    assert_eq!(shared.catalog().rows.len(), 2);
}

#[tokio::test]
async fn test_catalog_skips_unkeyable_entries() {
    let shared = Arc::new(Shared::new(0));
    load_catalog(&shared, catalog(&[("ALPHA", "A1", 1_000), ("ALPHA", "A:2", 1_000)])).await;
    assert_eq!(shared.catalog().rows.len(), 1);
}

#[tokio::test]
async fn test_flight_states_published_for_current_catalog() {
    let shared = Arc::new(Shared::new(0));
    load_catalog(&shared, catalog(&[("ALPHA", "A1", 1_000), ("ALPHA", "A2", 1_000)])).await;
    let reader = Arc::new(MemoryReader::new());
    reader.respond(contract().flights(chain_key("ALPHA"), chain_key("A1")), flight_return(1_000, 1));

    let poller = FlightsPoller { shared: shared.clone(), reader: reader.clone(), contract: contract() };
    poller.refresh().await;

    let flights = shared.flights.borrow().clone();
    assert_eq!(flights.len(), 1);
    assert_eq!(flights.failed.len(), 1);
}

#[tokio::test]
async fn test_flight_states_for_superseded_catalog_are_dropped() {
    let shared = Arc::new(Shared::new(0));
    load_catalog(&shared, catalog(&[("ALPHA", "A1", 1_000)])).await;
    let inner = MemoryReader::new();
    inner.respond(contract().flights(chain_key("ALPHA"), chain_key("A1")), flight_return(1_000, 1));
    let hooked = shared.clone();
    let reader = Arc::new(HookReader {
        inner,
        hook: Box::new(move || {
            hooked.catalog.send_modify(|snapshot| {
                let mut next = (**snapshot).clone();
                next.epoch += 1;
                *snapshot = Arc::new(next);
            });
        }),
    });

    let poller = FlightsPoller { shared: shared.clone(), reader, contract: contract() };
    poller.refresh().await;
    assert!(shared.flights.borrow().is_empty());
}

#[tokio::test]
async fn test_policies_for_superseded_session_are_dropped() {
    let shared = Arc::new(Shared::new(0));
    load_catalog(&shared, catalog(&[("ALPHA", "A1", 1_000)])).await;
    shared.set_session(Some(BUYER));
    let inner = MemoryReader::new();
    inner.respond(contract().policies(chain_key("ALPHA"), chain_key("A1"), BUYER), uint(1));
    let hooked = shared.clone();
    let reader = Arc::new(HookReader { inner, hook: Box::new(move || {
        hooked.set_session(Some(OTHER));
    }) });

    let poller = PoliciesPoller { shared: shared.clone(), reader, contract: contract() };
    poller.refresh().await;
    assert!(shared.policies.borrow().is_none());
}

#[tokio::test]
async fn test_disconnect_clears_policies() {
    let shared = Arc::new(Shared::new(0));
    load_catalog(&shared, catalog(&[("ALPHA", "A1", 1_000)])).await;
    shared.set_session(Some(BUYER));
    let reader = Arc::new(MemoryReader::new());
    reader.respond(contract().policies(chain_key("ALPHA"), chain_key("A1"), BUYER), uint(1));
    let poller = PoliciesPoller { shared: shared.clone(), reader, contract: contract() };

    poller.refresh().await;
    assert!(shared.policies.borrow().is_some());

    shared.set_session(None);
    poller.refresh().await;
    assert!(shared.policies.borrow().is_none());
}

#[tokio::test]
async fn test_derive_ignores_reads_for_other_owner() {
    let shared = Arc::new(Shared::new(700));
    load_catalog(&shared, catalog(&[("ALPHA", "A1", 1_000)])).await;
    shared.set_session(Some(BUYER));
    let reader = Arc::new(MemoryReader::new());
    reader.respond(contract().policies(chain_key("ALPHA"), chain_key("A1"), BUYER), uint(1));
    PoliciesPoller { shared: shared.clone(), reader, contract: contract() }.refresh().await;

    let key = join_key(&FlightIdentity::new("ALPHA", "A1").unwrap());
    assert_eq!(derive(&shared).buyer.rows[0].policy_status, Some(PolicyStatus::Purchased));

    // Switched accounts: the old buyer's policy must not show.
    shared.set_session(Some(OTHER));
    let dashboard = derive(&shared);
    assert_eq!(dashboard.buyer.rows[0].key, key);
    assert_eq!(dashboard.buyer.rows[0].policy_status, None);
}

#[tokio::test]
async fn test_config_needs_both_batches() {
    let shared = Arc::new(Shared::new(0));
    let reader = Arc::new(MemoryReader::new());
    script_config(&reader, 300, 60);
    reader.fail(Erc20::new(TOKEN).symbol(), "execution reverted");
    let poller = ProtocolPoller { shared: shared.clone(), reader: reader.clone(), contract: contract() };

    poller.refresh_base().await;
    assert!(shared.protocol.borrow().base.is_some());
    assert!(shared.config().is_none());

    reader.respond(Erc20::new(TOKEN).symbol(), symbol("USDC"));
    poller.refresh_meta().await;
    let config = shared.config().unwrap();
    assert_eq!(config.collateral_symbol, "USDC");
    assert_eq!(config.policy_window_seconds, 300);

    // A failed base batch withdraws the whole configuration.
    reader.set_down(true);
    poller.refresh_base().await;
    assert!(shared.config().is_none());
}

#[tokio::test]
async fn test_airlines_resolved_once() {
    let shared = Arc::new(Shared::new(0));
    load_catalog(&shared, catalog(&[("ALPHA", "A1", 1_000), ("BETA", "B1", 1_000)])).await;
    let reader = Arc::new(MemoryReader::new());
    let airline = |vault: Address| encode(&[Token::Address(vault), Token::Address(Address([2; 20])), Token::Uint(0), Token::FixedBytes([0; 32])]);
    reader.respond(contract().airlines(chain_key("ALPHA")), airline(Address([1; 20])));
    reader.respond(contract().airlines(chain_key("BETA")), airline(Address::ZERO));
    let poller = AirlinesPoller { shared: shared.clone(), reader: reader.clone(), contract: contract() };

    poller.refresh().await;
    assert_eq!(reader.calls(), 2);
    assert!(shared.airlines.borrow().contains_key("ALPHA"));
    assert!(!shared.airlines.borrow().contains_key("BETA"));

    // Only the still-unresolved airline is read again.
    poller.refresh().await;
    assert_eq!(reader.calls(), 3);
}

#[tokio::test]
async fn test_policy_allowance_scoped_to_session() {
    let shared = Arc::new(Shared::new(0));
    let reader = Arc::new(MemoryReader::new());
    script_config(&reader, 300, 60);
    reader.respond(Erc20::new(TOKEN).allowance(BUYER, POLICY), uint(10_000_000));
    ProtocolPoller { shared: shared.clone(), reader: reader.clone(), contract: contract() }.refresh_base().await;
    shared.set_session(Some(BUYER));

    let poller = BuyerAmountPoller {
        shared: shared.clone(),
        reader: reader.clone(),
        contract: contract(),
        read: BuyerRead::PolicyAllowance,
    };
    poller.refresh().await;
    let dashboard = derive(&shared);
    assert!(dashboard.buyer.wallet_connected);
    assert!(!dashboard.buyer.approve_collateral);

    // The new account has granted nothing yet; the old value must not carry over.
    shared.set_session(Some(OTHER));
    assert!(derive(&shared).buyer.approve_collateral);
}

#[tokio::test]
async fn test_engine_reaches_buyable_state() {
    let reader = Arc::new(MemoryReader::new());
    script_config(&reader, 300, 60);
    reader.respond(contract().flights(chain_key("ALPHA"), chain_key("A1")), flight_return(1_000, 1));
    reader.respond(contract().policies(chain_key("ALPHA"), chain_key("A1"), BUYER), uint(0));
    reader.respond(Erc20::new(TOKEN).allowance(BUYER, POLICY), uint(10_000_000));
    let source = Arc::new(FakeCatalog::new(Some(catalog(&[("ALPHA", "A1", 1_000)]))));

    let handle = SyncEngine::new(reader, source, contract())
        .with_clock(Arc::new(|| 700))
        .with_session(Some(BUYER))
        .spawn();
    let mut rx = handle.subscribe();
    let ready = tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|d| d.buyer.rows.first().is_some_and(|row| row.window.actionable)),
    )
    .await
    .map(|seen| seen.is_ok());
    assert_eq!(ready, Ok(true), "dashboard never became actionable");

    let dashboard = handle.dashboard();
    let row = &dashboard.buyer.rows[0];
    assert_eq!(row.chain_status, Some(FlightStatus::Scheduled));
    assert_eq!(row.window.phase, Phase::Open);
    assert_eq!(row.window.action, Action::Buy);
    assert_eq!(row.window.remaining_seconds, 240);
    assert!(dashboard.provider.protocol_ready);
    handle.shutdown();
}

const ALPHA_VAULT: Address = Address([0xa1; 20]);
const ALPHA_REWARDS: Address = Address([0xa2; 20]);
const BETA_VAULT: Address = Address([0xb8; 20]);
const BETA_REWARDS: Address = Address([0xb9; 20]);

/// Catalog, configuration and two resolved airlines, with `BUYER` connected.
async fn provider_setup(reader: &Arc<MemoryReader>) -> Arc<Shared> {
    let shared = Arc::new(Shared::new(700));
    load_catalog(&shared, catalog(&[("ALPHA", "A1", 1_000), ("BETA", "B1", 1_000)])).await;
    script_config(reader, 300, 60);
    ProtocolPoller { shared: shared.clone(), reader: reader.clone(), contract: contract() }.refresh_base().await;
    assert!(shared.config().is_some());
    shared.airlines.send_replace(Arc::new(BTreeMap::from([
        ("ALPHA".to_string(), AirlineChainInfo { vault: ALPHA_VAULT, rewards: ALPHA_REWARDS }),
        ("BETA".to_string(), AirlineChainInfo { vault: BETA_VAULT, rewards: BETA_REWARDS }),
    ])));
    shared.set_session(Some(BUYER));
    shared
}

fn provider_poller(shared: &Arc<Shared>, reader: Arc<dyn ChainReader>, read: ProviderRead) -> ProviderPoller {
    ProviderPoller { shared: shared.clone(), reader, read }
}

#[tokio::test]
async fn test_failed_vault_allowance_leaves_other_positions() {
    let reader = Arc::new(MemoryReader::new());
    let shared = provider_setup(&reader).await;
    // ALPHA's allowance read is left unscripted and reverts.
    reader.respond(Erc20::new(TOKEN).allowance(BUYER, BETA_VAULT), uint(20_000_000));
    for (vault, staked) in [(ALPHA_VAULT, 3_000_000), (BETA_VAULT, 4_000_000)] {
        reader.respond(active_balance_of(vault, BUYER), uint(staked));
    }
    for (rewards, amount) in [(ALPHA_REWARDS, 11), (BETA_REWARDS, 12)] {
        reader.respond(claimable(rewards, TOKEN, BUYER, NETWORK, DEFAULT_REWARD_BATCHES), uint(amount));
    }

    for read in [ProviderRead::VaultAllowance, ProviderRead::StakedBalance, ProviderRead::ClaimableRewards] {
        provider_poller(&shared, reader.clone(), read).refresh().await;
    }

    let dashboard = derive(&shared);
    let alpha = dashboard.positions["ALPHA"];
    assert_eq!(alpha.vault_allowance, None);
    assert_eq!(alpha.staked_balance, Some(3_000_000));
    assert_eq!(alpha.claimable_rewards, Some(11));
    assert_eq!(dashboard.positions["BETA"].vault_allowance, Some(20_000_000));

    let inputs = ProviderInputs { deposit: "10", ..Default::default() };
    let alpha_decision = dashboard.provider_decision("ALPHA", inputs).unwrap();
    assert!(alpha_decision.needs_approval);
    assert!(!alpha_decision.deposit_enabled);
    let beta_decision = dashboard.provider_decision("beta", inputs).unwrap();
    assert!(!beta_decision.needs_approval);
    assert!(beta_decision.deposit_enabled);
}

#[tokio::test]
async fn test_provider_reads_for_superseded_session_are_dropped() {
    let shared = provider_setup(&Arc::new(MemoryReader::new())).await;
    let inner = MemoryReader::new();
    inner.respond(active_balance_of(ALPHA_VAULT, BUYER), uint(3_000_000));
    inner.respond(active_balance_of(BETA_VAULT, BUYER), uint(4_000_000));
    let hooked = shared.clone();
    let reader = Arc::new(HookReader {
        inner,
        hook: Box::new(move || {
            hooked.set_session(Some(OTHER));
        }),
    });

    provider_poller(&shared, reader, ProviderRead::StakedBalance).refresh().await;
    assert!(shared.staked_balances.borrow().is_none());
    assert!(derive(&shared).positions.values().all(|p| p.staked_balance.is_none()));
}

#[tokio::test]
async fn test_disconnect_clears_provider_reads() {
    let reader = Arc::new(MemoryReader::new());
    let shared = provider_setup(&reader).await;
    reader.respond(active_balance_of(ALPHA_VAULT, BUYER), uint(3_000_000));
    let poller = provider_poller(&shared, reader.clone(), ProviderRead::StakedBalance);

    poller.refresh().await;
    assert!(shared.staked_balances.borrow().is_some());

    shared.set_session(None);
    poller.refresh().await;
    assert!(shared.staked_balances.borrow().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rederive_ends_on_latest_session() {
    let handle = SyncHandle::detached(0);
    let mut tasks = Vec::new();
    for i in 0..8u8 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            for j in 0..50u8 {
                if i == 0 {
                    handle.set_session(Some(Address([j; 20])));
                } else {
                    handle.shared().rederive();
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(handle.dashboard().session, handle.session());
    assert_eq!(handle.session(), Some(Address([49; 20])));
}
