//! Call builders and return decoders for the contracts the engine reads.

use delay_crypto::selector;
use delay_types::{Address, AirlineChainInfo, Amount, ChainKey, FlightStatus, OnChainFlightState, PolicyStatus};

use crate::abi::{encode, encode_call, AbiError, Decoder, Token};
use crate::reader::ContractCall;

fn call(to: Address, signature: &str, args: &[Token]) -> ContractCall {
    ContractCall::new(to, encode_call(selector(signature), args))
}

/// The flight-delay policy contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightDelays {
    pub address: Address,
}

impl FlightDelays {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn policy_premium(&self) -> ContractCall {
        call(self.address, "policyPremium()", &[])
    }

    pub fn policy_payout(&self) -> ContractCall {
        call(self.address, "policyPayout()", &[])
    }

    pub fn policy_window(&self) -> ContractCall {
        call(self.address, "policyWindow()", &[])
    }

    pub fn delay_window(&self) -> ContractCall {
        call(self.address, "delayWindow()", &[])
    }

    pub fn collateral(&self) -> ContractCall {
        call(self.address, "collateral()", &[])
    }

    pub fn network(&self) -> ContractCall {
        call(self.address, "NETWORK()", &[])
    }

    pub fn flights(&self, airline: ChainKey, flight: ChainKey) -> ContractCall {
        call(self.address, "flights(bytes32,bytes32)", &[airline.into(), flight.into()])
    }

    pub fn policies(&self, airline: ChainKey, flight: ChainKey, buyer: Address) -> ContractCall {
        call(
            self.address,
            "policies(bytes32,bytes32,address)",
            &[airline.into(), flight.into(), Token::Address(buyer)],
        )
    }

    pub fn airlines(&self, airline: ChainKey) -> ContractCall {
        call(self.address, "airlines(bytes32)", &[airline.into()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20 {
    pub address: Address,
}

impl Erc20 {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn symbol(&self) -> ContractCall {
        call(self.address, "symbol()", &[])
    }

    pub fn decimals(&self) -> ContractCall {
        call(self.address, "decimals()", &[])
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> ContractCall {
        call(self.address, "allowance(address,address)", &[Token::Address(owner), Token::Address(spender)])
    }

    pub fn balance_of(&self, owner: Address) -> ContractCall {
        call(self.address, "balanceOf(address)", &[Token::Address(owner)])
    }
}

pub fn active_balance_of(vault: Address, account: Address) -> ContractCall {
    call(vault, "activeBalanceOf(address)", &[Token::Address(account)])
}

/// `claimable(token, account, data)` with
/// `data = abi.encode(network, maxRewards, bytes[] hints)` and no hints.
pub fn claimable(rewards: Address, token: Address, account: Address, network: Address, max_rewards: u64) -> ContractCall {
    let data = encode(&[Token::Address(network), Token::Uint(Amount::from(max_rewards)), Token::Array(Vec::new())]);
    call(
        rewards,
        "claimable(address,address,bytes)",
        &[Token::Address(token), Token::Address(account), Token::Bytes(data)],
    )
}

pub fn decode_uint(data: &[u8]) -> Result<Amount, AbiError> {
    Decoder::new(data).uint(0)
}

pub fn decode_u64(data: &[u8]) -> Result<u64, AbiError> {
    Decoder::new(data).uint64(0)
}

pub fn decode_u8(data: &[u8]) -> Result<u8, AbiError> {
    Decoder::new(data).uint8(0)
}

pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    Decoder::new(data).address(0)
}

pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    Decoder::new(data).string()
}

/// `flights(...)` returns `(uint48 timestamp, uint8 status, uint128 policiesSold, bytes32 previousFlightId)`.
pub fn decode_flight(data: &[u8]) -> Result<OnChainFlightState, AbiError> {
    let d = Decoder::new(data);
    let code = d.uint8(1)?;
    let status = FlightStatus::from_code(code).ok_or(AbiError::UnknownCode { kind: "flight status", code })?;
    Ok(OnChainFlightState { scheduled_timestamp: d.uint64(0)?, status, policies_sold: d.uint(2)? })
}

pub fn decode_policy(data: &[u8]) -> Result<PolicyStatus, AbiError> {
    let code = decode_u8(data)?;
    PolicyStatus::from_code(code).ok_or(AbiError::UnknownCode { kind: "policy status", code })
}

/// `airlines(...)` returns `(address vault, address rewards, uint256 covered, bytes32 lastFlightId)`.
/// `None` when the airline has no vault registered.
pub fn decode_airline(data: &[u8]) -> Result<Option<AirlineChainInfo>, AbiError> {
    let d = Decoder::new(data);
    Ok(AirlineChainInfo::resolved(d.address(0)?, d.address(1)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flights_call_layout() {
        let contract = FlightDelays::new(Address([9; 20]));
        let c = contract.flights(ChainKey([1; 32]), ChainKey([2; 32]));
        assert_eq!(c.to, Address([9; 20]));
        assert_eq!(&c.data[..4], &selector("flights(bytes32,bytes32)"));
        assert_eq!(c.data.len(), 4 + 64);
        assert_eq!(&c.data[4..36], &[1; 32]);
        assert_eq!(&c.data[36..68], &[2; 32]);
    }

    #[test]
    fn claimable_call_embeds_hint_payload() {
        let c = claimable(Address([1; 20]), Address([2; 20]), Address([3; 20]), Address([4; 20]), 5);
        // selector + 3 head words + bytes length + 4 payload words
        assert_eq!(c.data.len(), 4 + 32 * 8);
        assert_eq!(c.data[4 + 95], 0x60);
        assert_eq!(c.data[4 + 127], 0x80);
        assert_eq!(&c.data[4 + 140..4 + 160], &[4; 20]);
        assert_eq!(c.data[4 + 191], 5);
    }

    #[test]
    fn decodes_flight_tuple() {
        let data = encode(&[Token::Uint(1_000), Token::Uint(2), Token::Uint(17), Token::FixedBytes([0; 32])]);
        let state = decode_flight(&data).unwrap();
        assert_eq!(state.scheduled_timestamp, 1_000);
        assert_eq!(state.status, FlightStatus::Delayed);
        assert_eq!(state.policies_sold, 17);
    }

    #[test]
    fn rejects_unknown_status_codes() {
        let data = encode(&[Token::Uint(1_000), Token::Uint(9), Token::Uint(0), Token::FixedBytes([0; 32])]);
        assert_eq!(decode_flight(&data), Err(AbiError::UnknownCode { kind: "flight status", code: 9 }));
        assert!(decode_policy(&encode(&[Token::Uint(3)])).is_err());
    }

    #[test]
    fn unregistered_airline_decodes_to_none() {
        let zero = encode(&[Token::Address(Address::ZERO), Token::Address(Address::ZERO), Token::Uint(0), Token::FixedBytes([0; 32])]);
        assert_eq!(decode_airline(&zero), Ok(None));

        let live = encode(&[Token::Address(Address([1; 20])), Token::Address(Address([2; 20])), Token::Uint(0), Token::FixedBytes([0; 32])]);
        let info = decode_airline(&live).unwrap().unwrap();
        assert_eq!(info.vault, Address([1; 20]));
        assert_eq!(info.rewards, Address([2; 20]));
    }
}
