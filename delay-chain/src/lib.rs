pub mod abi;
pub mod calls;
pub mod error;
pub mod fetch;
pub mod memory;
pub mod reader;
pub mod rpc;

pub use calls::{Erc20, FlightDelays};
pub use error::{ChainError, ConfigUnavailable};
pub use fetch::{
    assemble_config, fetch_claimable_rewards, fetch_collateral_balance, fetch_collateral_meta, fetch_flight_states,
    fetch_policy_allowance, fetch_policy_states, fetch_protocol_base, fetch_protocol_config, fetch_staked_balances,
    fetch_vault_allowances, resolve_airlines, AirlineResolution, CollateralMeta, ProtocolBase,
};
pub use memory::MemoryReader;
pub use reader::{CallOutcome, ChainReader, ContractCall};
pub use rpc::JsonRpcReader;
