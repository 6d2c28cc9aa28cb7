//! Read-only HTTP view of the engine plus session control.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use delay_crypto::{chain_key, normalize};
use delay_engine::{BuyerView, ProviderDecision, ProviderInputs, ProviderView};
use delay_sync::SyncHandle;
use delay_types::{Address, ChainKey, ProtocolConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub sync: SyncHandle,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("airline {0:?} is not in the catalog")]
    UnknownAirline(String),
    #[error("identifier is empty")]
    EmptyIdentifier,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownAirline(_) => StatusCode::NOT_FOUND,
            ApiError::EmptyIdentifier => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Health {
    pub status: String,
    pub catalog_loaded: bool,
    pub protocol_ready: bool,
    pub session: Option<Address>,
    pub now: u64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct KeyResponse {
    pub identifier: String,
    pub normalized: String,
    pub chain_key: ChainKey,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionRequest {
    pub address: Address,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionResponse {
    pub address: Option<Address>,
    pub changed: bool,
}

/// Raw provider input strings, exactly as typed.
#[derive(Deserialize, Debug, Default)]
pub struct ActionQuery {
    #[serde(default)]
    pub deposit: String,
    #[serde(default)]
    pub withdraw: String,
    #[serde(default)]
    pub max_rewards: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/protocol", get(protocol))
        .route("/flights", get(flights))
        .route("/providers", get(providers))
        .route("/providers/:airline_id/actions", get(provider_actions))
        .route("/keys/:identifier", get(key))
        .route("/session", get(session).put(connect).delete(disconnect))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(
    addr: SocketAddr,
    sync: SyncHandle,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(AppState { sync });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}

async fn root() -> &'static str {
    "Flight delay eligibility engine"
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let dashboard = state.sync.dashboard();
    Json(Health {
        status: "ok".to_string(),
        catalog_loaded: dashboard.catalog_loaded,
        protocol_ready: dashboard.config.is_some(),
        session: dashboard.session,
        now: dashboard.now,
    })
}

async fn protocol(State(state): State<AppState>) -> Json<Option<ProtocolConfig>> {
    Json(state.sync.dashboard().config.clone())
}

async fn flights(State(state): State<AppState>) -> Json<BuyerView> {
    Json(state.sync.dashboard().buyer.clone())
}

async fn providers(State(state): State<AppState>) -> Json<ProviderView> {
    Json(state.sync.dashboard().provider.clone())
}

async fn provider_actions(
    State(state): State<AppState>,
    Path(airline_id): Path<String>,
    Query(query): Query<ActionQuery>,
) -> Result<Json<ProviderDecision>, ApiError> {
    let inputs = ProviderInputs { deposit: &query.deposit, withdraw: &query.withdraw, max_rewards: &query.max_rewards };
    state
        .sync
        .dashboard()
        .provider_decision(&airline_id, inputs)
        .map(Json)
        .ok_or(ApiError::UnknownAirline(airline_id))
}

async fn key(Path(identifier): Path<String>) -> Result<Json<KeyResponse>, ApiError> {
    let normalized = normalize(&identifier);
    if normalized.is_empty() {
        return Err(ApiError::EmptyIdentifier);
    }
    Ok(Json(KeyResponse { chain_key: chain_key(&identifier), identifier, normalized }))
}

async fn session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(SessionResponse { address: state.sync.session(), changed: false })
}

async fn connect(State(state): State<AppState>, Json(req): Json<SessionRequest>) -> Json<SessionResponse> {
    let changed = state.sync.set_session(Some(req.address));
    Json(SessionResponse { address: Some(req.address), changed })
}

async fn disconnect(State(state): State<AppState>) -> Json<SessionResponse> {
    let changed = state.sync.set_session(None);
    Json(SessionResponse { address: None, changed })
}
