//! Off-chain flight catalog as served by the flights API.

use serde::{Deserialize, Serialize};

/// Separator of the in-memory join key.
pub const JOIN_DELIMITER: &str = "::";

/// Identifiers may not contain this character at all; otherwise `"A:" + "B"`
/// and `"A" + ":B"` would join to the same key.
const RESERVED_CHAR: char = ':';

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("{field} is empty")]
    Empty { field: &'static str },
    #[error("{field} {value:?} contains the reserved character ':'")]
    ReservedDelimiter { field: &'static str, value: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiFlightStatus {
    Scheduled,
    Delayed,
    Departed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Airline {
    pub airline_id: String,
    pub name: String,
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFlight {
    pub airline_id: String,
    pub flight_id: String,
    pub departure_timestamp: u64,
    pub status: ApiFlightStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AirlineWithFlights {
    #[serde(flatten)]
    pub airline: Airline,
    pub flights: Vec<CatalogFlight>,
}

/// Human-readable (airline, flight) pair as it appears in the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightIdentity {
    pub airline_id: String,
    pub flight_id: String,
}

impl FlightIdentity {
    pub fn new(airline_id: impl Into<String>, flight_id: impl Into<String>) -> Result<Self, IdentityError> {
        let airline_id = airline_id.into();
        let flight_id = flight_id.into();
        validate("airline id", &airline_id)?;
        validate("flight id", &flight_id)?;
        Ok(Self { airline_id, flight_id })
    }
}

fn validate(field: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.trim().is_empty() {
        return Err(IdentityError::Empty { field });
    }
    if value.contains(RESERVED_CHAR) {
        return Err(IdentityError::ReservedDelimiter { field, value: value.to_string() });
    }
    Ok(())
}

/// One flattened (airline, flight) entry of the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub identity: FlightIdentity,
    pub airline_name: String,
    pub departure_timestamp: u64,
    pub status: ApiFlightStatus,
}

/// A complete, successfully fetched catalog. Replaced wholesale on refresh.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub airlines: Vec<AirlineWithFlights>,
}

impl Catalog {
    /// Flattens airlines into rows, in API order, dropping entries whose
    /// identifiers cannot be keyed. Rejected entries are returned alongside.
    pub fn rows(&self) -> (Vec<CatalogRow>, Vec<IdentityError>) {
        let mut rows = Vec::new();
        let mut rejected = Vec::new();
        for entry in &self.airlines {
            for flight in &entry.flights {
                match FlightIdentity::new(&entry.airline.airline_id, &flight.flight_id) {
                    Ok(identity) => rows.push(CatalogRow {
                        identity,
                        airline_name: entry.airline.name.clone(),
                        departure_timestamp: flight.departure_timestamp,
                        status: flight.status,
                    }),
                    Err(e) => rejected.push(e),
                }
            }
        }
        (rows, rejected)
    }

    pub fn airline_ids(&self) -> Vec<String> {
        self.airlines
            .iter()
            .map(|a| a.airline.airline_id.clone())
            .filter(|id| validate("airline id", id).is_ok())
            .collect()
    }

    pub fn airline(&self, airline_id: &str) -> Option<&Airline> {
        self.airlines
            .iter()
            .map(|a| &a.airline)
            .find(|a| a.airline_id == airline_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(airline: &str, id: &str) -> CatalogFlight {
        CatalogFlight {
            airline_id: airline.into(),
            flight_id: id.into(),
            departure_timestamp: 1_000,
            status: ApiFlightStatus::Scheduled,
        }
    }

    #[test]
    fn identity_rejects_delimiter_and_blank() {
        assert!(matches!(
            FlightIdentity::new("AL:PHA", "F1"),
            Err(IdentityError::ReservedDelimiter { field: "airline id", .. })
        ));
        assert_eq!(
            FlightIdentity::new("ALPHA", "  "),
            Err(IdentityError::Empty { field: "flight id" })
        );
    }

    #[test]
    fn rows_flatten_in_order_and_skip_bad_ids() {
        let catalog = Catalog {
            airlines: vec![AirlineWithFlights {
                airline: Airline { airline_id: "ALPHA".into(), name: "Alpha Air".into(), code: "AA".into() },
                flights: vec![flight("ALPHA", "A1"), flight("ALPHA", "A::2"), flight("ALPHA", "A3")],
            }],
        };
        let (rows, rejected) = catalog.rows();
        let ids: Vec<_> = rows.iter().map(|r| r.identity.flight_id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A3"]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rows[0].airline_name, "Alpha Air");
    }

    #[test]
    fn catalog_flight_uses_api_field_names() {
        let json = r#"{"airlineId":"ALPHA","flightId":"A1","departureTimestamp":42,"status":"DELAYED","updatedAt":7}"#;
        let f: CatalogFlight = serde_json::from_str(json).unwrap();
        assert_eq!(f.status, ApiFlightStatus::Delayed);
        assert_eq!(f.departure_timestamp, 42);
    }
}
