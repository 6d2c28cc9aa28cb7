//! Eligibility and purchase-window state machine.
//!
//! Everything here is a pure function of on-chain flight state, protocol
//! configuration, the buyer's session and the current time. Callers
//! recompute on every clock tick or snapshot change; nothing is cached.

use delay_types::{Amount, FlightStatus, OnChainFlightState, PolicyStatus, ProtocolConfig};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Before,
    Open,
    After,
    /// Windows are misconfigured (`closeAt <= openAt`); purchasing is rejected.
    Invalid,
    /// Flight is delayed, departed, not created, or configuration is missing.
    NotApplicable,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReading {
    pub phase: Phase,
    pub remaining_seconds: u64,
}

/// Purchase window of a scheduled flight at `now`.
///
/// `now == openAt` and `now == closeAt` are both inside the window.
pub fn purchase_phase(scheduled: u64, config: &ProtocolConfig, now: u64) -> PhaseReading {
    let scheduled = i128::from(scheduled);
    let now = i128::from(now);
    let open_at = scheduled - i128::from(config.policy_window_seconds);
    let close_at = scheduled - i128::from(config.delay_window_seconds);
    let remaining = |until: i128| u64::try_from((until - now).max(0)).unwrap_or(u64::MAX);

    if close_at <= open_at {
        return PhaseReading { phase: Phase::Invalid, remaining_seconds: remaining(scheduled) };
    }
    if now < open_at {
        PhaseReading { phase: Phase::Before, remaining_seconds: remaining(open_at) }
    } else if now <= close_at {
        PhaseReading { phase: Phase::Open, remaining_seconds: remaining(close_at) }
    } else {
        // Also covers `now >= scheduled` while the chain still says Scheduled.
        PhaseReading { phase: Phase::After, remaining_seconds: remaining(scheduled) }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Purchased,
    Claim,
    Claimed,
    None,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", content = "seconds", rename_all = "snake_case")]
pub enum Timer {
    OpensIn(u64),
    ClosesIn(u64),
    DepartsIn(u64),
    Delayed,
    None,
}

impl Timer {
    pub fn seconds(&self) -> u64 {
        match self {
            Self::OpensIn(s) | Self::ClosesIn(s) | Self::DepartsIn(s) => *s,
            Self::Delayed | Self::None => 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Chain,
    /// On-chain state is unknown; status derived from the catalog departure.
    Catalog,
}

/// The connected wallet as far as buying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuyerContext {
    pub wallet_connected: bool,
    /// Collateral allowance granted to the policy contract; `None` if unknown.
    pub policy_allowance: Option<Amount>,
}

/// Per-flight inputs after the join. `chain` and `policy` are `None` when
/// their reads failed or have not completed.
#[derive(Debug, Clone, Copy)]
pub struct FlightInputs<'a> {
    pub chain: Option<&'a OnChainFlightState>,
    pub policy: Option<PolicyStatus>,
    pub catalog_departure: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub status: FlightStatus,
    pub source: StatusSource,
    pub phase: Phase,
    pub remaining_seconds: u64,
    pub timer: Timer,
    pub action: Action,
    /// Whether `action` may be dispatched right now.
    pub actionable: bool,
}

impl WindowState {
    pub fn label(&self) -> &'static str {
        match self.action {
            Action::Buy => "Buy",
            Action::Purchased => "Purchased",
            Action::Claim => "Claim",
            Action::Claimed => "Claimed",
            Action::None => self.status.label(),
        }
    }
}

pub fn allowance_enough(config: Option<&ProtocolConfig>, allowance: Option<Amount>) -> bool {
    match (config, allowance) {
        (Some(config), Some(allowance)) => allowance >= config.policy_premium,
        _ => false,
    }
}

pub fn window_state(
    flight: FlightInputs<'_>,
    config: Option<&ProtocolConfig>,
    buyer: &BuyerContext,
    now: u64,
) -> WindowState {
    let (status, scheduled, source) = match flight.chain {
        Some(state) => (state.status, state.scheduled_timestamp, StatusSource::Chain),
        None if flight.catalog_departure > now => {
            (FlightStatus::Scheduled, flight.catalog_departure, StatusSource::Catalog)
        }
        None => (FlightStatus::NotCreated, flight.catalog_departure, StatusSource::Catalog),
    };
    let policy = flight.policy.unwrap_or_default();
    let departs_in = Timer::DepartsIn(scheduled.saturating_sub(now));

    let build = |phase, timer: Timer, action, actionable| WindowState {
        status,
        source,
        phase,
        remaining_seconds: timer.seconds(),
        timer,
        action,
        actionable,
    };

    match status {
        FlightStatus::Delayed => match policy {
            PolicyStatus::Purchased => build(Phase::NotApplicable, Timer::Delayed, Action::Claim, buyer.wallet_connected),
            PolicyStatus::Claimed => build(Phase::NotApplicable, Timer::Delayed, Action::Claimed, false),
            PolicyStatus::None => build(Phase::NotApplicable, Timer::Delayed, Action::None, false),
        },
        FlightStatus::Departed => build(Phase::NotApplicable, Timer::None, Action::None, false),
        FlightStatus::NotCreated => build(
            Phase::NotApplicable,
            Timer::DepartsIn(flight.catalog_departure.saturating_sub(now)),
            Action::Buy,
            false,
        ),
        FlightStatus::Scheduled => {
            let Some(config) = config else {
                return build(Phase::NotApplicable, departs_in, Action::Buy, false);
            };
            let reading = purchase_phase(scheduled, config, now);
            match reading.phase {
                Phase::Before => build(reading.phase, Timer::OpensIn(reading.remaining_seconds), Action::Buy, false),
                Phase::Open if policy.holds_policy() => {
                    build(reading.phase, Timer::ClosesIn(reading.remaining_seconds), Action::Purchased, false)
                }
                Phase::Open => {
                    // An unread policy could already be held; wait for it.
                    let actionable = buyer.wallet_connected
                        && source == StatusSource::Chain
                        && flight.policy.is_some()
                        && allowance_enough(Some(config), buyer.policy_allowance);
                    build(reading.phase, Timer::ClosesIn(reading.remaining_seconds), Action::Buy, actionable)
                }
                Phase::After | Phase::Invalid | Phase::NotApplicable => {
                    build(reading.phase, Timer::DepartsIn(reading.remaining_seconds), Action::Buy, false)
                }
            }
        }
    }
}
