//! Subscription registry
//!
//! Owns every live subscription pair and the last-activity bookkeeping.
//! Mutations for one address serialize through a per-address mutex, so a
//! hung chain call stalls only its own address; reads go straight through
//! the concurrent map. The registry - not the caller-facing watch set - is
//! the source of truth for what is actually subscribed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::chain::{ChainClient, RawNotification, SubscriptionHandle};
use crate::error::{Error, Result};

/// Bookkeeping for one watched address
struct WatchEntry {
    account_sub: SubscriptionHandle,
    log_sub: SubscriptionHandle,
    last_activity: Instant,
    /// Last observed balance, for account-change deltas
    last_lamports: u64,
    watched_since: DateTime<Utc>,
}

/// Registry of live subscriptions, keyed by wallet address.
///
/// Invariant: an address has at most one live subscription pair; every entry
/// carries a last-activity timestamp. Absence means "never monitored".
pub struct SubscriptionRegistry {
    entries: DashMap<Pubkey, WatchEntry>,
    // Per-address mutexes serializing subscribe/unsubscribe/reap. Entries
    // are never reclaimed; watch sets stay in the tens to low hundreds.
    address_locks: DashMap<Pubkey, Arc<Mutex<()>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            address_locks: DashMap::new(),
        }
    }

    fn address_lock(&self, address: &Pubkey) -> Arc<Mutex<()>> {
        self.address_locks
            .entry(*address)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Open the account-change and log subscriptions for an address.
    ///
    /// Rejects an address that is already monitored. If the second
    /// subscription fails, the first is released before the error returns -
    /// no partial state survives.
    pub async fn subscribe(
        &self,
        chain: &dyn ChainClient,
        address: Pubkey,
        notif_tx: mpsc::Sender<RawNotification>,
        initial_lamports: u64,
    ) -> Result<()> {
        let lock = self.address_lock(&address);
        let _guard = lock.lock().await;

        if self.entries.contains_key(&address) {
            return Err(Error::AlreadyMonitored(address));
        }

        let account_sub = chain.subscribe_account(address, notif_tx.clone()).await?;

        let log_sub = match chain.subscribe_logs(address, notif_tx).await {
            Ok(handle) => handle,
            Err(e) => {
                // Roll back the first subscription before reporting
                account_sub.release();
                return Err(e);
            }
        };

        self.entries.insert(
            address,
            WatchEntry {
                account_sub,
                log_sub,
                last_activity: Instant::now(),
                last_lamports: initial_lamports,
                watched_since: Utc::now(),
            },
        );

        info!(address = %address, "Subscribed to wallet activity");
        Ok(())
    }

    /// Release both subscriptions and remove all bookkeeping.
    ///
    /// Handle release is best-effort and independent per handle; the entry
    /// is removed regardless.
    pub async fn unsubscribe(&self, address: &Pubkey) -> Result<()> {
        let lock = self.address_lock(address);
        let _guard = lock.lock().await;

        let (_, entry) = self
            .entries
            .remove(address)
            .ok_or(Error::NotMonitored(*address))?;

        entry.account_sub.release();
        entry.log_sub.release();

        info!(address = %address, "Unsubscribed from wallet activity");
        Ok(())
    }

    /// Refresh last-activity; returns false (no-op) if the address is unknown
    pub fn touch(&self, address: &Pubkey) -> bool {
        match self.entries.get_mut(address) {
            Some(mut entry) => {
                entry.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Refresh last-activity and return the lamport delta versus the
    /// previous observation; `None` if the address is unknown
    pub fn record_account_change(&self, address: &Pubkey, lamports: u64) -> Option<i64> {
        let mut entry = self.entries.get_mut(address)?;
        let delta = lamports as i64 - entry.last_lamports as i64;
        entry.last_lamports = lamports;
        entry.last_activity = Instant::now();
        Some(delta)
    }

    /// True iff the address is monitored and saw activity within `ttl`
    pub fn is_active(&self, address: &Pubkey, ttl: Duration) -> bool {
        self.entries
            .get(address)
            .map(|entry| entry.last_activity.elapsed() <= ttl)
            .unwrap_or(false)
    }

    /// When monitoring of this address began
    pub fn watched_since(&self, address: &Pubkey) -> Option<DateTime<Utc>> {
        self.entries.get(address).map(|entry| entry.watched_since)
    }

    /// Snapshot of all monitored addresses (order unspecified)
    pub fn list_monitored(&self) -> Vec<Pubkey> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    /// Snapshot of addresses with activity within `ttl`
    pub fn list_active(&self, ttl: Duration) -> Vec<Pubkey> {
        self.entries
            .iter()
            .filter(|entry| entry.last_activity.elapsed() <= ttl)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn monitored_count(&self) -> usize {
        self.entries.len()
    }

    /// Remove every entry idle for longer than `ttl`; returns the removed
    /// addresses.
    ///
    /// Staleness is re-verified under the per-address lock, so a concurrent
    /// re-add (which refreshes last-activity) wins over the sweep snapshot.
    pub async fn reap(&self, ttl: Duration) -> Vec<Pubkey> {
        let candidates: Vec<Pubkey> = self
            .entries
            .iter()
            .filter(|entry| entry.last_activity.elapsed() > ttl)
            .map(|entry| *entry.key())
            .collect();

        let mut removed = Vec::new();
        for address in candidates {
            let lock = self.address_lock(&address);
            let _guard = lock.lock().await;

            let still_stale = self
                .entries
                .get(&address)
                .map(|entry| entry.last_activity.elapsed() > ttl)
                .unwrap_or(false);
            if !still_stale {
                debug!(address = %address, "Skipping reap - wallet active again");
                continue;
            }

            if let Some((_, entry)) = self.entries.remove(&address) {
                entry.account_sub.release();
                entry.log_sub.release();
                info!(address = %address, "Reaped inactive wallet");
                removed.push(address);
            }
        }

        removed
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainClient;

    fn channel() -> (
        mpsc::Sender<RawNotification>,
        mpsc::Receiver<RawNotification>,
    ) {
        mpsc::channel(16)
    }

    #[tokio::test]
    async fn test_subscribe_opens_exactly_one_pair() {
        let chain = MockChainClient::new();
        let registry = SubscriptionRegistry::new();
        let address = Pubkey::new_unique();

        let (tx, _rx) = channel();
        registry
            .subscribe(&chain, address, tx, 0)
            .await
            .unwrap();

        assert_eq!(chain.live_subscriptions_for(&address), 2);
        assert_eq!(registry.list_monitored(), vec![address]);
        assert!(registry.watched_since(&address).is_some());
    }

    #[tokio::test]
    async fn test_double_subscribe_is_rejected() {
        let chain = MockChainClient::new();
        let registry = SubscriptionRegistry::new();
        let address = Pubkey::new_unique();

        let (tx, _rx) = channel();
        registry
            .subscribe(&chain, address, tx.clone(), 0)
            .await
            .unwrap();
        let second = registry.subscribe(&chain, address, tx, 0).await;

        assert!(matches!(second, Err(Error::AlreadyMonitored(a)) if a == address));
        // The first pair is untouched
        assert_eq!(chain.live_subscriptions_for(&address), 2);
    }

    #[tokio::test]
    async fn test_failed_second_subscription_rolls_back_first() {
        let chain = MockChainClient::new();
        let registry = SubscriptionRegistry::new();
        let address = Pubkey::new_unique();

        chain.fail_logs_subscriptions(true);
        let (tx, _rx) = channel();
        let result = registry.subscribe(&chain, address, tx, 0).await;

        assert!(matches!(result, Err(Error::Subscribe { .. })));
        assert_eq!(chain.live_subscriptions(), 0);
        assert!(registry.list_monitored().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_everything() {
        let chain = MockChainClient::new();
        let registry = SubscriptionRegistry::new();
        let address = Pubkey::new_unique();

        let (tx, _rx) = channel();
        registry
            .subscribe(&chain, address, tx, 0)
            .await
            .unwrap();
        registry.unsubscribe(&address).await.unwrap();

        assert_eq!(chain.live_subscriptions(), 0);
        assert!(registry.list_monitored().is_empty());
        assert!(!registry.touch(&address));
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_address() {
        let registry = SubscriptionRegistry::new();
        let address = Pubkey::new_unique();
        assert!(matches!(
            registry.unsubscribe(&address).await,
            Err(Error::NotMonitored(a)) if a == address
        ));
    }

    #[tokio::test]
    async fn test_record_account_change_tracks_delta() {
        let chain = MockChainClient::new();
        let registry = SubscriptionRegistry::new();
        let address = Pubkey::new_unique();

        let (tx, _rx) = channel();
        registry
            .subscribe(&chain, address, tx, 1_000)
            .await
            .unwrap();

        assert_eq!(registry.record_account_change(&address, 1_500), Some(500));
        assert_eq!(registry.record_account_change(&address, 400), Some(-1_100));
        assert_eq!(
            registry.record_account_change(&Pubkey::new_unique(), 1),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_ttl() {
        let chain = MockChainClient::new();
        let registry = SubscriptionRegistry::new();
        let address = Pubkey::new_unique();
        let ttl = Duration::from_secs(60);

        let (tx, _rx) = channel();
        registry
            .subscribe(&chain, address, tx, 0)
            .await
            .unwrap();
        assert!(registry.is_active(&address, ttl));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!registry.is_active(&address, ttl));
        assert!(registry.list_active(ttl).is_empty());

        // A touch revives it
        assert!(registry.touch(&address));
        assert!(registry.is_active(&address, ttl));
        assert_eq!(registry.list_active(ttl), vec![address]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_removes_only_stale_entries() {
        let chain = MockChainClient::new();
        let registry = SubscriptionRegistry::new();
        let stale = Pubkey::new_unique();
        let fresh = Pubkey::new_unique();
        let ttl = Duration::from_secs(3600);

        let (tx, _rx) = channel();
        registry.subscribe(&chain, stale, tx.clone(), 0).await.unwrap();
        tokio::time::advance(Duration::from_secs(3601)).await;
        registry.subscribe(&chain, fresh, tx, 0).await.unwrap();

        let removed = registry.reap(ttl).await;
        assert_eq!(removed, vec![stale]);
        assert_eq!(registry.list_monitored(), vec![fresh]);
        assert_eq!(chain.live_subscriptions_for(&stale), 0);
        assert_eq!(chain.live_subscriptions_for(&fresh), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_recheck_spares_revived_wallet() {
        let chain = MockChainClient::new();
        let registry = SubscriptionRegistry::new();
        let address = Pubkey::new_unique();
        let ttl = Duration::from_secs(60);

        let (tx, _rx) = channel();
        registry
            .subscribe(&chain, address, tx, 0)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        // Activity lands between the sweep snapshot and the removal
        registry.touch(&address);

        let removed = registry.reap(ttl).await;
        assert!(removed.is_empty());
        assert_eq!(registry.list_monitored(), vec![address]);
        assert_eq!(chain.live_subscriptions_for(&address), 2);
    }
}
