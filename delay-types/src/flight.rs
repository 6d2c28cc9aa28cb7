use serde::{Deserialize, Serialize};

use crate::amount;

/// On-chain lifecycle of a flight, as stored by the policy contract.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FlightStatus {
    NotCreated = 0,
    Scheduled = 1,
    Delayed = 2,
    Departed = 3,
}

impl FlightStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NotCreated),
            1 => Some(Self::Scheduled),
            2 => Some(Self::Delayed),
            3 => Some(Self::Departed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotCreated => "Not created",
            Self::Scheduled => "Scheduled",
            Self::Delayed => "Delayed",
            Self::Departed => "Departed",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnChainFlightState {
    pub scheduled_timestamp: u64,
    pub status: FlightStatus,
    #[serde(with = "amount")]
    pub policies_sold: u128,
}

/// Per (flight, buyer) policy state. A missing record reads as `None`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PolicyStatus {
    #[default]
    None = 0,
    Purchased = 1,
    Claimed = 2,
}

impl PolicyStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Purchased),
            2 => Some(Self::Claimed),
            _ => None,
        }
    }

    pub fn holds_policy(&self) -> bool {
        matches!(self, Self::Purchased | Self::Claimed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Purchased => "Purchased",
            Self::Claimed => "Claimed",
        }
    }
}
