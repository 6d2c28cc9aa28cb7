use async_trait::async_trait;
use delay_flights::{CatalogClient, CatalogError};
use delay_types::Catalog;

/// Where the flight catalog comes from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Catalog, CatalogError>;
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn fetch_catalog(&self) -> Result<Catalog, CatalogError> {
        CatalogClient::fetch_catalog(self).await
    }
}
