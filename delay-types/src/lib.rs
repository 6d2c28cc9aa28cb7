pub mod address;
pub mod amount;
pub mod catalog;
pub mod flight;
pub mod outcome;
pub mod protocol;
pub mod provider;

pub use address::{Address, ChainKey};
pub use amount::Amount;
pub use catalog::{Airline, AirlineWithFlights, ApiFlightStatus, Catalog, CatalogFlight, CatalogRow, FlightIdentity, IdentityError};
pub use flight::{FlightStatus, OnChainFlightState, PolicyStatus};
pub use outcome::ReadOutcome;
pub use protocol::ProtocolConfig;
pub use provider::{AirlineChainInfo, ProviderPosition};
