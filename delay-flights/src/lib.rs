//! Client for the off-chain flights catalog.
//!
//! `GET {base}/airlines` lists airlines; `GET {base}/airlines/{id}/flights`
//! lists one airline's flights. A catalog refresh succeeds only if every
//! request does.

use std::time::Duration;

use delay_types::{Airline, AirlineWithFlights, Catalog, CatalogFlight};
use futures::future::try_join_all;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog base url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {body}")]
    Status { endpoint: String, status: u16, body: String },
    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct AirlinesResponse {
    #[serde(default)]
    airlines: Vec<Airline>,
}

#[derive(Deserialize)]
struct FlightsResponse {
    #[serde(default)]
    flights: Vec<CatalogFlight>,
}

#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base: Url,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let base = Url::parse(base_url).map_err(|e| CatalogError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(CatalogError::BaseUrl { url: base_url.to_string(), reason: "not a base url".into() });
        }
        let client = Client::builder().timeout(timeout).build().map_err(|source| CatalogError::Transport {
            endpoint: base_url.to_string(),
            source,
        })?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Appends percent-encoded path segments to the base url.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        let endpoint = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| CatalogError::Transport { endpoint: endpoint.clone(), source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| CatalogError::Transport { endpoint: endpoint.clone(), source })?;
        if !status.is_success() {
            return Err(CatalogError::Status { endpoint, status: status.as_u16(), body });
        }
        serde_json::from_str(&body).map_err(|source| CatalogError::Decode { endpoint, source })
    }

    pub async fn fetch_airlines(&self) -> Result<Vec<Airline>, CatalogError> {
        let response: AirlinesResponse = self.get_json(self.endpoint(&["airlines"])).await?;
        Ok(response.airlines)
    }

    pub async fn fetch_flights(&self, airline_id: &str) -> Result<Vec<CatalogFlight>, CatalogError> {
        let response: FlightsResponse = self.get_json(self.endpoint(&["airlines", airline_id, "flights"])).await?;
        Ok(response.flights)
    }

    /// Airlines, then every airline's flights concurrently. Order follows
    /// the API.
    pub async fn fetch_catalog(&self) -> Result<Catalog, CatalogError> {
        let airlines = self.fetch_airlines().await?;
        let airlines = try_join_all(airlines.into_iter().map(|airline| async move {
            let flights = self.fetch_flights(&airline.airline_id).await?;
            Ok::<_, CatalogError>(AirlineWithFlights { airline, flights })
        }))
        .await?;
        debug!(airlines = airlines.len(), "catalog fetched");
        Ok(Catalog { airlines })
    }
}
