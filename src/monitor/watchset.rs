//! Monitoring facade
//!
//! `WalletMonitor` ties the pieces together: wallets are validated and
//! entered into the registry, raw notifications flow through one worker
//! task into the normalizer and classifier, and significant activity goes
//! out on the event bus. The reaper runs alongside the worker and evicts
//! wallets that stay quiet past the TTL.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, RawNotification};
use crate::config::MonitorConfig;
use crate::error::Result;

use super::classifier::SignificanceClassifier;
use super::events::{EventBus, SignificantActivity};
use super::normalizer::{normalize_account_change, normalize_logs};
use super::reaper;
use super::registry::SubscriptionRegistry;
use super::validator::WalletValidator;

pub struct WalletMonitor {
    chain: Arc<dyn ChainClient>,
    registry: Arc<SubscriptionRegistry>,
    validator: WalletValidator,
    classifier: SignificanceClassifier,
    bus: EventBus,
    config: MonitorConfig,
    notif_tx: mpsc::Sender<RawNotification>,
    // Taken by the worker task on start
    notif_rx: std::sync::Mutex<Option<mpsc::Receiver<RawNotification>>>,
    shutdown: broadcast::Sender<()>,
}

impl WalletMonitor {
    pub fn new(chain: Arc<dyn ChainClient>, config: MonitorConfig) -> Self {
        let (notif_tx, notif_rx) = mpsc::channel(config.channel_capacity);
        let (shutdown, _) = broadcast::channel(1);

        Self {
            chain,
            registry: Arc::new(SubscriptionRegistry::new()),
            validator: WalletValidator::new(config.min_wallet_balance_sol),
            classifier: SignificanceClassifier::new(config.significance_threshold_sol),
            bus: EventBus::new(config.event_capacity),
            config,
            notif_tx,
            notif_rx: std::sync::Mutex::new(Some(notif_rx)),
            shutdown,
        }
    }

    /// Validate a wallet and open its subscription pair.
    ///
    /// The balance fetched during validation seeds the registry's delta
    /// tracking, so the first account-change event already carries a delta.
    pub async fn add_wallet(&self, address: Pubkey) -> Result<()> {
        let snapshot = self.validator.check(self.chain.as_ref(), &address).await?;

        self.registry
            .subscribe(
                self.chain.as_ref(),
                address,
                self.notif_tx.clone(),
                snapshot.lamports,
            )
            .await?;

        info!(address = %address, lamports = snapshot.lamports, "Wallet added to watch set");
        Ok(())
    }

    /// Stop monitoring a wallet and release its subscriptions
    pub async fn remove_wallet(&self, address: &Pubkey) -> Result<()> {
        self.registry.unsubscribe(address).await
    }

    /// All currently monitored wallets
    pub fn monitored_wallets(&self) -> Vec<Pubkey> {
        self.registry.list_monitored()
    }

    /// Monitored wallets with activity inside the TTL window
    pub fn active_wallets(&self) -> Vec<Pubkey> {
        self.registry.list_active(self.config.inactivity_ttl())
    }

    pub fn monitored_count(&self) -> usize {
        self.registry.monitored_count()
    }

    /// Subscribe to the significant-activity stream
    pub fn events(&self) -> broadcast::Receiver<SignificantActivity> {
        self.bus.subscribe()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub(crate) fn chain(&self) -> &dyn ChainClient {
        self.chain.as_ref()
    }

    /// Launch the notification worker and the reaper.
    ///
    /// Idempotent in effect: a second call finds the receiver already taken
    /// and only spawns another reaper, so it should not be called twice.
    pub fn start(&self) {
        if let Some(rx) = self.notif_rx.lock().expect("notif_rx lock poisoned").take() {
            let worker = Worker {
                chain: self.chain.clone(),
                registry: self.registry.clone(),
                classifier: self.classifier.clone(),
                bus: self.bus.clone(),
            };
            tokio::spawn(worker.run(rx, self.shutdown.subscribe()));

            reaper::spawn(
                self.registry.clone(),
                self.config.inactivity_ttl(),
                self.config.reap_interval(),
                self.shutdown.subscribe(),
            );
            info!("Wallet monitor started");
        } else {
            warn!("Wallet monitor already started");
        }
    }

    /// Signal the worker and reaper to stop. Subscriptions stay registered;
    /// drop the monitor to release them.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
        info!("Wallet monitor stopping");
    }

    #[cfg(test)]
    pub(crate) fn notifier(&self) -> mpsc::Sender<RawNotification> {
        self.notif_tx.clone()
    }
}

struct Worker {
    chain: Arc<dyn ChainClient>,
    registry: Arc<SubscriptionRegistry>,
    classifier: SignificanceClassifier,
    bus: EventBus,
}

impl Worker {
    async fn run(
        self,
        mut rx: mpsc::Receiver<RawNotification>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Notification worker running");
        loop {
            tokio::select! {
                notification = rx.recv() => match notification {
                    Some(notification) => self.handle(notification).await,
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        info!("Notification worker stopped");
    }

    async fn handle(&self, notification: RawNotification) {
        match notification {
            RawNotification::AccountChange {
                address,
                slot,
                lamports,
                owner,
                executable,
            } => {
                // A notification for an unknown wallet (late delivery after
                // unsubscribe) is dropped
                let Some(delta) = self.registry.record_account_change(&address, lamports) else {
                    debug!(address = %address, "Dropping account change for unmonitored wallet");
                    return;
                };

                let event =
                    normalize_account_change(address, slot, lamports, delta, owner, executable);
                self.publish_if_significant(event);
            }
            RawNotification::Logs {
                address,
                slot,
                signature,
                logs: _,
                failed: _,
            } => {
                if !self.registry.touch(&address) {
                    debug!(address = %address, "Dropping logs for unmonitored wallet");
                    return;
                }

                match normalize_logs(self.chain.as_ref(), address, slot, signature.as_deref())
                    .await
                {
                    Ok(event) => self.publish_if_significant(event),
                    Err(e) => {
                        // Fail closed: an event we cannot normalize is never
                        // forwarded
                        warn!(address = %address, error = %e, "Dropping unnormalizable logs notification");
                    }
                }
            }
        }
    }

    fn publish_if_significant(&self, event: super::normalizer::ActivityEvent) {
        let verdict = self.classifier.classify(&event);
        if verdict.significant {
            info!(
                address = %event.address,
                slot = event.slot,
                measure_sol = verdict.measure_sol,
                "Significant wallet activity"
            );
            self.bus.publish(SignificantActivity { event, verdict });
        } else {
            debug!(
                address = %event.address,
                measure_sol = verdict.measure_sol,
                "Activity below significance threshold"
            );
        }
    }
}
