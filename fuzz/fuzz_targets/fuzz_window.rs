#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use delay_engine::{window_state, Action, BuyerContext, FlightInputs, Phase};
use delay_types::{Address, FlightStatus, OnChainFlightState, PolicyStatus, ProtocolConfig};

#[derive(Arbitrary, Debug)]
struct WindowInput {
    scheduled: u64,
    status: u8,
    policy: Option<u8>,
    known_on_chain: bool,
    catalog_departure: u64,
    policy_window: u64,
    delay_window: u64,
    premium: u128,
    allowance: Option<u128>,
    connected: bool,
    configured: bool,
    now: u64,
}

fuzz_target!(|data: WindowInput| {
    let chain = OnChainFlightState {
        scheduled_timestamp: data.scheduled,
        status: FlightStatus::from_code(data.status % 4).unwrap_or(FlightStatus::NotCreated),
        policies_sold: 0,
    };
    let config = ProtocolConfig {
        policy_premium: data.premium,
        policy_payout: 0,
        policy_window_seconds: data.policy_window,
        delay_window_seconds: data.delay_window,
        collateral_token: Address::ZERO,
        collateral_symbol: "USDC".into(),
        collateral_decimals: 6,
        network: Address::ZERO,
    };
    let buyer = BuyerContext { wallet_connected: data.connected, policy_allowance: data.allowance };
    let flight = FlightInputs {
        chain: data.known_on_chain.then_some(&chain),
        policy: data.policy.and_then(|p| PolicyStatus::from_code(p % 3)),
        catalog_departure: data.catalog_departure,
    };

    let state = window_state(flight, data.configured.then_some(&config), &buyer, data.now);

    if state.actionable {
        assert!(data.connected);
        assert!(matches!(state.action, Action::Buy | Action::Claim));
    }
    if state.phase == Phase::Open {
        assert!(data.configured && data.policy_window > data.delay_window);
    }
    if state.action == Action::Buy && state.actionable {
        assert_eq!(state.phase, Phase::Open);
        assert!(data.allowance.is_some_and(|a| a >= data.premium));
    }
    assert_eq!(state.remaining_seconds, state.timer.seconds());
});
