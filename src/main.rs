//! `coinlink` command line.
//!
//! Inspects token transfers and accounts through the same code paths the bridge uses
//! for the host application.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` path of the JSON configuration (default `config.json`)
//! - `RUST_LOG` log filter, `OTEL_*` variables enable OTLP export

use alloy_primitives::{Address, B256};
use clap::{Parser, Subcommand};
use coinlink::config::BridgeConfig;
use coinlink::observer::TracingObserver;
use coinlink::resolver::Lookup;
use coinlink::session::{ConnectMode, WalletSession};
use coinlink::util::{SigDown, Telemetry};
use coinlink_types::amount::decimal_string;
use dotenvy::dotenv;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "coinlink")]
#[command(about = "Token wallet bridge", version)]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve who sent how much to whom in a transaction
    Status {
        tx: B256,
        /// Keep polling until the node knows the transaction
        #[arg(long)]
        wait: bool,
    },
    /// Block until a transaction has enough confirmations
    Wait { tx: B256 },
    /// Execution result of a mined transaction, ignoring confirmations
    Completion { tx: B256 },
    /// Token and native balance of an account
    Balance { address: Address },
    /// Whether the token sale has completed KYC for an account
    Kyc { address: Address },
    /// Purchases made by an account at the token sale
    Purchases {
        address: Address,
        /// Print only the summed totals
        #[arg(long)]
        total: bool,
    },
    /// Connect to the configured wallet and print its current account
    Account,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let args = CliArgs::parse();
    let config = BridgeConfig::load_from_path(&args.config)?;
    let session = WalletSession::from_config(&config, Arc::new(TracingObserver))?;
    let sig_down = SigDown::try_new()?;
    let cancel = sig_down.cancellation_token();

    let output = match args.command {
        Command::Status { tx, wait } => {
            let lookup = if wait {
                Lookup::UntilFound(cancel)
            } else {
                Lookup::Once
            };
            serde_json::to_value(session.resolver().resolve(tx, lookup).await?)?
        }
        Command::Wait { tx } => {
            session.resolver().wait_for_confirmations(tx, &cancel).await?;
            json!({ "tx": tx, "confirmed": true })
        }
        Command::Completion { tx } => {
            serde_json::to_value(session.resolver().completion_status(tx).await?)?
        }
        Command::Balance { address } => {
            let (token, native) = tokio::try_join!(
                session.token_balance(Some(address)),
                session.native_balance(Some(address))
            )?;
            json!({
                "address": address.to_checksum(None),
                "token": token.map(|v| decimal_string(&v)),
                "native": native.map(|v| decimal_string(&v)),
            })
        }
        Command::Kyc { address } => {
            json!({
                "address": address.to_checksum(None),
                "kyc": session.kyc_status(Some(address)).await?,
            })
        }
        Command::Purchases { address, total } => {
            if total {
                serde_json::to_value(session.purchase_total(Some(address)).await?)?
            } else {
                serde_json::to_value(session.purchase_events(Some(address)).await?)?
            }
        }
        Command::Account => {
            session.connect(ConnectMode::Passive).await;
            json!({
                "mode": session.mode(),
                "initialized": session.is_initialized(),
                "address": session.wallet_address().map(|a| a.to_checksum(None)),
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    sig_down.shutdown().await;
    Ok(())
}
