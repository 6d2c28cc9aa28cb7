pub mod join;
pub mod provider;
pub mod units;
pub mod views;
pub mod window;

pub use join::{join, Joined};
pub use provider::{desired_amount, needs_approval, provider_decision, ProviderDecision, ProviderInputs};
pub use units::{format_amount, format_units, parse_units, UnitsError};
pub use views::{buyer_view, provider_view, BuyerRow, BuyerSnapshot, BuyerView, ProviderCard, ProviderView};
pub use window::{
    allowance_enough, purchase_phase, window_state, Action, BuyerContext, FlightInputs, Phase, PhaseReading,
    StatusSource, Timer, WindowState,
};
