//! Inactivity reaper
//!
//! Periodic sweep that unsubscribes wallets with no activity inside the
//! TTL window, so the watch set tracks wallets that still matter instead
//! of growing without bound.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::registry::SubscriptionRegistry;

/// Spawn the reaper task. It sweeps every `sweep_interval` until the
/// shutdown signal fires.
pub fn spawn(
    registry: Arc<SubscriptionRegistry>,
    ttl: Duration,
    sweep_interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; consume it so the first sweep
        // happens a full interval after start
        ticker.tick().await;

        info!(
            ttl_secs = ttl.as_secs(),
            interval_secs = sweep_interval.as_secs(),
            "Reaper running"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = registry.reap(ttl).await;
                    if removed.is_empty() {
                        debug!("Reaper sweep found no inactive wallets");
                    } else {
                        info!(count = removed.len(), "Reaper evicted inactive wallets");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        info!("Reaper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainClient;
    use crate::chain::RawNotification;
    use solana_sdk::pubkey::Pubkey;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_reaper_evicts_quiet_wallets_and_spares_active_ones() {
        let chain = MockChainClient::new();
        let registry = Arc::new(SubscriptionRegistry::new());
        let quiet = Pubkey::new_unique();
        let busy = Pubkey::new_unique();

        let (tx, _rx) = mpsc::channel::<RawNotification>(16);
        registry.subscribe(&chain, quiet, tx.clone(), 0).await.unwrap();
        registry.subscribe(&chain, busy, tx, 0).await.unwrap();

        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = spawn(
            registry.clone(),
            Duration::from_secs(60),
            Duration::from_secs(30),
            shutdown_tx.subscribe(),
        );

        // Keep the busy wallet alive across the TTL boundary
        tokio::time::advance(Duration::from_secs(45)).await;
        registry.touch(&busy);
        tokio::time::advance(Duration::from_secs(46)).await;

        // Let the sweep that follows the TTL expiry run
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(registry.list_monitored(), vec![busy]);
        assert_eq!(chain.live_subscriptions_for(&quiet), 0);
        assert_eq!(chain.live_subscriptions_for(&busy), 2);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_stops_on_shutdown() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = spawn(
            registry,
            Duration::from_secs(60),
            Duration::from_secs(30),
            shutdown_tx.subscribe(),
        );

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
