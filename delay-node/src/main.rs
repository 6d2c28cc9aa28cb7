use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use delay_chain::{FlightDelays, JsonRpcReader};
use delay_flights::CatalogClient;
use delay_sync::{PollIntervals, SyncEngine};
use delay_types::Address;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Flight delay eligibility node", long_about = None)]
struct Args {
    /// Ethereum JSON-RPC endpoint.
    #[arg(long, env = "DELAY_RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,
    /// Address of the flight delay policy contract.
    #[arg(long, env = "DELAY_FLIGHT_DELAYS_ADDRESS")]
    flight_delays_address: Address,
    #[arg(long, env = "DELAY_FLIGHTS_API_URL", default_value = "http://127.0.0.1:8085")]
    flights_api_url: String,
    #[arg(long, env = "DELAY_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    /// Account to treat as connected at startup.
    #[arg(long, env = "DELAY_BUYER")]
    buyer: Option<Address>,
    #[arg(long, env = "DELAY_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!(contract = %args.flight_delays_address, rpc = %args.rpc_url, "starting delay node");

    let timeout = Duration::from_secs(args.request_timeout_secs);
    let reader = JsonRpcReader::new(args.rpc_url.clone(), timeout).context("failed to build rpc client")?;
    let catalog = CatalogClient::new(&args.flights_api_url, timeout).context("failed to build flights api client")?;

    let sync = SyncEngine::new(Arc::new(reader), Arc::new(catalog), FlightDelays::new(args.flight_delays_address))
        .with_intervals(PollIntervals::default())
        .with_session(args.buyer)
        .spawn();

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let api_sync = sync.clone();
    let api = tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        };
        if let Err(e) = delay_api::start_server(args.listen, api_sync, shutdown).await {
            error!(error = %e, "api server stopped");
        }
    });

    info!("Node running. Press Ctrl+C to stop.");
    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    info!("shutting down");
    sync.shutdown();
    let _ = stop_tx.send(true);
    let _ = api.await;
    Ok(())
}
