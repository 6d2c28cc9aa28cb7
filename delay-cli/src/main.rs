mod format;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use delay_api::{Health, SessionRequest, SessionResponse};
use delay_crypto::{chain_key, normalize};
use delay_engine::{BuyerView, ProviderDecision, ProviderView};
use delay_types::Address;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use format::{display_amount, timer_label};

#[derive(Parser)]
#[command(author, version, about = "Query a flight delay eligibility node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, env = "DELAY_NODE_URL", default_value = "http://127.0.0.1:3000")]
    node_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized identifier and its on-chain key
    Key { identifier: String },
    /// Node and data-source status
    Health,
    /// Flights with their current action and countdown
    Flights,
    /// Airline vaults and the connected provider's positions
    Providers,
    /// Provider actions for the given input amounts
    Actions {
        airline: String,
        #[arg(long, default_value = "")]
        deposit: String,
        #[arg(long, default_value = "")]
        withdraw: String,
        #[arg(long, default_value = "")]
        max_rewards: String,
    },
    /// Connect an account
    Connect { address: Address },
    /// Disconnect the current account
    Disconnect,
}

async fn json<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if !status.is_success() {
        bail!("node returned {}: {}", status, res.text().await.unwrap_or_default());
    }
    res.json().await.context("unexpected response body")
}

fn print_flights(view: &BuyerView) {
    println!(
        "wallet: {}  protocol: {}  approve collateral: {}",
        if view.wallet_connected { "connected" } else { "none" },
        if view.protocol_ready { "ready" } else { "unavailable" },
        view.approve_collateral
    );
    println!("{:<10} {:<10} {:<12} {:<10} {:<10} {:<20} {}", "AIRLINE", "FLIGHT", "CHAIN", "POLICY", "ACTION", "TIMER", "ENABLED");
    for row in &view.rows {
        println!(
            "{:<10} {:<10} {:<12} {:<10} {:<10} {:<20} {}",
            row.identity.airline_id,
            row.identity.flight_id,
            row.chain_status_label,
            row.policy_label,
            row.window.label(),
            timer_label(&row.window.timer),
            row.window.actionable
        );
    }
}

fn print_providers(view: &ProviderView) {
    let symbol = &view.collateral_symbol;
    let decimals = view.collateral_decimals;
    println!("{:<10} {:<20} {:<44} {:<20} {:<20} {}", "AIRLINE", "NAME", "VAULT", "STAKED", "REWARDS", "ALLOWANCE");
    for card in &view.airlines {
        let vault = card.vault.map_or_else(|| "unresolved".to_string(), |v| v.to_string());
        println!(
            "{:<10} {:<20} {:<44} {:<20} {:<20} {}",
            card.airline_id,
            card.name,
            vault,
            display_amount(card.position.staked_balance, decimals, symbol),
            display_amount(card.position.claimable_rewards, decimals, symbol),
            display_amount(card.position.vault_allowance, decimals, symbol),
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base = cli.node_url.trim_end_matches('/');

    match &cli.command {
        Commands::Key { identifier } => {
            let normalized = normalize(identifier);
            if normalized.is_empty() {
                bail!("identifier is empty");
            }
            println!("normalized: {normalized}");
            println!("chain key:  {}", chain_key(identifier));
        }
        Commands::Health => {
            let health: Health = json(client.get(format!("{base}/health")).send().await?).await?;
            println!("status:   {}", health.status);
            println!("catalog:  {}", if health.catalog_loaded { "loaded" } else { "not loaded" });
            println!("protocol: {}", if health.protocol_ready { "ready" } else { "unavailable" });
            println!("session:  {}", health.session.map_or_else(|| "none".to_string(), |a| a.to_string()));
        }
        Commands::Flights => {
            let view: BuyerView = json(client.get(format!("{base}/flights")).send().await?).await?;
            print_flights(&view);
        }
        Commands::Providers => {
            let view: ProviderView = json(client.get(format!("{base}/providers")).send().await?).await?;
            print_providers(&view);
        }
        Commands::Actions { airline, deposit, withdraw, max_rewards } => {
            let res = client
                .get(format!("{base}/providers/{airline}/actions"))
                .query(&[("deposit", deposit), ("withdraw", withdraw), ("max_rewards", max_rewards)])
                .send()
                .await?;
            let decision: ProviderDecision = json(res).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Connect { address } => {
            let res = client.put(format!("{base}/session")).json(&SessionRequest { address: *address }).send().await?;
            let session: SessionResponse = json(res).await?;
            println!("connected {} (changed: {})", address, session.changed);
        }
        Commands::Disconnect => {
            let session: SessionResponse = json(client.delete(format!("{base}/session")).send().await?).await?;
            println!("disconnected (changed: {})", session.changed);
        }
    }

    Ok(())
}
