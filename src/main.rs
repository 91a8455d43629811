//! Signing gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────────┐
//!                       │                   SIGNING GATEWAY                     │
//!                       │                                                       │
//!   Client Request      │  ┌─────────┐   ┌─────────┐   ┌─────────┐   ┌───────┐ │
//!   ────────────────────┼─▶│  http   │──▶│  auth   │──▶│ rewrite │──▶│signing│ │
//!   (session cookie)    │  │ server  │   │  gate   │   │  rules  │   │schnorr│ │
//!                       │  └─────────┘   └────┬────┘   └────┬────┘   └───┬───┘ │
//!                       │                     │             │            │     │
//!                       │              ┌──────▼─────┐ ┌─────▼─────┐      │     │
//!                       │              │permissions │ │  storage  │      │     │
//!                       │              │  (grants)  │ │ (proxies) │      │     │
//!                       │              └────────────┘ └───────────┘      │     │
//!                       │                                                ▼     │
//!   Client Response     │  ┌─────────┐                              ┌───────┐ │
//!   ◀───────────────────┼──│  relay  │◀─────────────────────────────│forward│─┼──▶ Consensus
//!                       │  └─────────┘                              └───────┘ │     node
//!                       └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use signing_gateway::config::{self, GatewayConfig};
use signing_gateway::lifecycle::{signals, startup, Shutdown};
use signing_gateway::observability::{logging, metrics};
use signing_gateway::signing::keys::{PRIVATE_KEY_ENV_VAR, PUBLIC_KEY_ENV_VAR};
use signing_gateway::signing::SigningKeyPair;

#[derive(Parser)]
#[command(name = "signing-gateway")]
#[command(about = "Authenticated signing gateway for consensus nodes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway (default)
    Serve {
        /// TOML configuration file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print a fresh signing key pair as environment assignments
    Keygen,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { config: None }) {
        Commands::Keygen => {
            let keys = SigningKeyPair::generate();
            println!("{}={}", PRIVATE_KEY_ENV_VAR, keys.private_hex());
            println!("{}={}", PUBLIC_KEY_ENV_VAR, keys.public_hex());
            Ok(())
        }
        Commands::Serve { config } => serve(config).await,
    }
}

async fn serve(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config: GatewayConfig = match &path {
        Some(path) => config::load_config(path)?,
        None => config::loader::default_config()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!("signing-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        default_node = %config.upstream.default_node_url,
        db_path = %config.storage.db_path,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = startup::bootstrap(&config)?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    startup::serve(&config, state, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
