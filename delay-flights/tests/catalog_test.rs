//! CatalogClient against a mock flights API.

use std::time::Duration;

use delay_flights::{CatalogClient, CatalogError};
use delay_types::ApiFlightStatus;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> CatalogClient {
    CatalogClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

async fn mount_airlines(server: &MockServer, airlines: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/airlines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "airlines": airlines })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetch_catalog_keeps_api_order() {
    let server = MockServer::start().await;
    mount_airlines(
        &server,
        json!([
            {"airlineId": "ALPHA", "name": "Alpha Air", "code": "AA"},
            {"airlineId": "BETA", "name": "Beta Jet", "code": "BJ"}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/airlines/ALPHA/flights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flights": [
            {"airlineId": "ALPHA", "flightId": "A2", "departureTimestamp": 2000, "status": "DELAYED"},
            {"airlineId": "ALPHA", "flightId": "A1", "departureTimestamp": 1000, "status": "SCHEDULED"}
        ]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/airlines/BETA/flights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let catalog = client(&server).fetch_catalog().await.unwrap();
    assert_eq!(catalog.airlines.len(), 2);
    assert_eq!(catalog.airlines[0].airline.name, "Alpha Air");
    assert_eq!(catalog.airlines[0].flights[0].flight_id, "A2");
    assert_eq!(catalog.airlines[0].flights[0].status, ApiFlightStatus::Delayed);
    assert!(catalog.airlines[1].flights.is_empty());

    let (rows, rejected) = catalog.rows();
    assert_eq!(rows.len(), 2);
    assert!(rejected.is_empty());
}

#[tokio::test]
async fn airline_ids_are_percent_encoded() {
    let server = MockServer::start().await;
    mount_airlines(&server, json!([{"airlineId": "SKY HIGH", "name": "Sky High", "code": "SH"}])).await;
    Mock::given(method("GET"))
        .and(path("/airlines/SKY%20HIGH/flights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flights": []})))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = client(&server).fetch_catalog().await.unwrap();
    assert_eq!(catalog.airlines[0].airline.airline_id, "SKY HIGH");
}

#[tokio::test]
async fn one_failed_airline_fails_the_refresh() {
    let server = MockServer::start().await;
    mount_airlines(
        &server,
        json!([
            {"airlineId": "ALPHA", "name": "Alpha Air", "code": "AA"},
            {"airlineId": "BETA", "name": "Beta Jet", "code": "BJ"}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/airlines/ALPHA/flights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flights": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/airlines/BETA/flights"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&server)
        .await;

    let err = client(&server).fetch_catalog().await.unwrap_err();
    assert!(matches!(err, CatalogError::Status { status: 500, .. }));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/airlines"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_catalog().await.unwrap_err();
    assert!(matches!(err, CatalogError::Decode { .. }));
}

#[test]
fn rejects_unusable_base_url() {
    assert!(matches!(
        CatalogClient::new("not a url", Duration::from_secs(1)),
        Err(CatalogError::BaseUrl { .. })
    ));
}
