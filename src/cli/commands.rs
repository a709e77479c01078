//! CLI command implementations

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::chain::{ChainClient, RpcChainClient};
use crate::config::Config;
use crate::monitor::{ActivityKind, SignificantActivity, WalletMonitor};

/// Start monitoring the given wallets (and optionally the top holders of a
/// mint), printing significant activity until Ctrl-C.
pub async fn start(config: &Config, wallets: Vec<String>, holders_of: Option<String>) -> Result<()> {
    if wallets.is_empty() && holders_of.is_none() {
        anyhow::bail!("Nothing to monitor: pass --wallet and/or --holders-of");
    }

    info!(
        "Starting wallet monitor (threshold: {} SOL, TTL: {}s)",
        config.monitor.significance_threshold_sol, config.monitor.inactivity_ttl_secs
    );

    let chain = Arc::new(RpcChainClient::new(&config.rpc));
    let monitor = WalletMonitor::new(chain, config.monitor.clone());

    for wallet in &wallets {
        let address = parse_pubkey(wallet)?;
        match monitor.add_wallet(address).await {
            Ok(()) => info!("Monitoring {}", address),
            Err(e) => warn!("Skipping {}: {}", address, e),
        }
    }

    if let Some(mint) = holders_of {
        let mint = parse_pubkey(&mint)?;
        let started = monitor.watch_top_holders(&mint).await?;
        info!("Monitoring {} holder wallets of {}", started.len(), mint);
    }

    if monitor.monitored_count() == 0 {
        anyhow::bail!("No wallet passed validation; nothing to monitor");
    }

    let mut events = monitor.events();
    monitor.start();
    info!(
        "Watching {} wallets; press Ctrl+C to stop",
        monitor.monitored_count()
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(activity) => print_activity(&activity),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event consumer lagged; {} events dropped", missed);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    monitor.stop();
    Ok(())
}

/// Print the top holder wallets of a token mint
pub async fn holders(config: &Config, mint: &str, limit: usize) -> Result<()> {
    let mint = parse_pubkey(mint)?;
    let chain = RpcChainClient::new(&config.rpc);

    let holders = chain.token_holders(&mint, limit).await?;
    if holders.is_empty() {
        println!("No token accounts found for mint {}", mint);
        return Ok(());
    }

    println!("Top {} holder wallets of {}:", holders.len(), mint);
    for (i, owner) in holders.iter().enumerate() {
        println!("{:>4}. {}", i + 1, owner);
    }
    Ok(())
}

/// Check whether a wallet would be accepted for monitoring
pub async fn validate(config: &Config, wallet: &str) -> Result<()> {
    let address = parse_pubkey(wallet)?;
    let chain = RpcChainClient::new(&config.rpc);
    let validator =
        crate::monitor::WalletValidator::new(config.monitor.min_wallet_balance_sol);

    match validator.check(&chain, &address).await {
        Ok(snapshot) => {
            println!("{} is a valid wallet", address);
            println!(
                "  balance: {} SOL",
                solana_sdk::native_token::lamports_to_sol(snapshot.lamports)
            );
            println!("  owner: {}", snapshot.owner);
        }
        Err(e) => {
            println!("{} is not monitorable: {}", address, e);
        }
    }
    Ok(())
}

/// Show current configuration with secrets masked
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check RPC connectivity
pub async fn health(config: &Config) -> Result<()> {
    println!("Checking RPC endpoint...");
    let chain = RpcChainClient::new(&config.rpc);

    match chain.health().await {
        Ok((version, slot)) => {
            println!("  OK - node version {}, slot {}", version, slot);
            Ok(())
        }
        Err(e) => {
            error!("RPC health check failed: {}", e);
            anyhow::bail!("RPC endpoint unreachable: {}", e)
        }
    }
}

fn parse_pubkey(s: &str) -> Result<Pubkey> {
    Pubkey::from_str(s).map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", s, e))
}

fn print_activity(activity: &SignificantActivity) {
    match &activity.event.kind {
        ActivityKind::AccountChange(payload) => {
            println!(
                "[{}] {} balance change: {:+} lamports ({:.4} SOL moved) at slot {}",
                activity.event.timestamp.format("%H:%M:%S"),
                activity.event.address,
                payload.delta_lamports,
                activity.verdict.measure_sol,
                activity.event.slot,
            );
        }
        ActivityKind::Transaction(payload) => {
            println!(
                "[{}] {} {:?} transaction {} ({:.4} SOL moved, {}) at slot {}",
                activity.event.timestamp.format("%H:%M:%S"),
                activity.event.address,
                payload.transaction_type,
                payload.signature,
                activity.verdict.measure_sol,
                if payload.success { "ok" } else { "failed" },
                activity.event.slot,
            );
        }
    }
}
