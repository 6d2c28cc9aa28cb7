//! Identity keying.
//!
//! Human-readable airline and flight identifiers become two kinds of keys:
//! the on-chain [`ChainKey`] (keccak-256 of the normalized identifier) and the
//! in-memory [`JoinKey`] used to line up catalog rows with chain reads.
//! Both go through [`normalize`], so identifiers differing only in case or
//! surrounding whitespace address the same entity.

use delay_types::catalog::JOIN_DELIMITER;
use delay_types::{ChainKey, FlightIdentity};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::selector::keccak256;

pub fn normalize(id: &str) -> String {
    id.trim().to_uppercase()
}

pub fn chain_key(id: &str) -> ChainKey {
    ChainKey(keccak256(normalize(id).as_bytes()))
}

/// Composite `AIRLINE::FLIGHT` key for in-memory maps. Never sent on-chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct JoinKey(String);

impl JoinKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn join_key(identity: &FlightIdentity) -> JoinKey {
    JoinKey(format!(
        "{}{}{}",
        normalize(&identity.airline_id),
        JOIN_DELIMITER,
        normalize(&identity.flight_id)
    ))
}
