//! Wallet Radar - Solana wallet activity monitor
//!
//! Watches a set of wallets over RPC websockets, normalizes their on-chain
//! activity and reports the movements that cross the significance threshold.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use wallet_radar::cli::commands;
use wallet_radar::config::Config;

/// Wallet Radar - Solana wallet activity monitor
#[derive(Parser)]
#[command(name = "radar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring wallet activity
    Start {
        /// Wallet address to monitor (repeatable)
        #[arg(short, long = "wallet", value_name = "ADDRESS")]
        wallets: Vec<String>,

        /// Also monitor the top holder wallets of this token mint
        #[arg(long, value_name = "MINT")]
        holders_of: Option<String>,
    },

    /// List the top holder wallets of a token mint
    Holders {
        /// Token mint address
        mint: String,

        /// Maximum token accounts to scan
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Check whether a wallet would be accepted for monitoring
    Validate {
        /// Wallet address
        wallet: String,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check RPC connectivity
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wallet_radar=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Start { wallets, holders_of } => {
            commands::start(&config, wallets, holders_of).await
        }
        Commands::Holders { mint, limit } => commands::holders(&config, &mint, limit).await,
        Commands::Validate { wallet } => commands::validate(&config, &wallet).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
