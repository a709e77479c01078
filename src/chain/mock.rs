//! Scriptable chain client for unit tests

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::types::{
    AccountSnapshot, RawNotification, SubscriptionHandle, SubscriptionKind, TransactionInfo,
};
use super::ChainClient;

/// In-memory chain client; accounts, transactions and failures are scripted
/// by the test, and live subscriptions are counted so teardown is observable.
#[derive(Default)]
pub struct MockChainClient {
    accounts: DashMap<Pubkey, AccountSnapshot>,
    transactions: DashMap<String, TransactionInfo>,
    signatures: DashMap<Pubkey, Vec<String>>,
    holders: Mutex<Vec<Pubkey>>,
    fail_account_subscribe: AtomicBool,
    fail_logs_subscribe: AtomicBool,
    fail_transaction_fetch: AtomicBool,
    live: Arc<DashMap<u64, (Pubkey, SubscriptionKind)>>,
    next_id: AtomicU64,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_system_wallet(&self, address: Pubkey, lamports: u64) {
        self.accounts.insert(
            address,
            AccountSnapshot {
                lamports,
                owner: system_program::id(),
                executable: false,
            },
        );
    }

    pub fn add_account(&self, address: Pubkey, lamports: u64, owner: Pubkey, executable: bool) {
        self.accounts.insert(
            address,
            AccountSnapshot {
                lamports,
                owner,
                executable,
            },
        );
    }

    pub fn add_transaction(&self, info: TransactionInfo) {
        self.transactions.insert(info.signature.clone(), info);
    }

    pub fn set_signatures(&self, address: Pubkey, signatures: Vec<String>) {
        self.signatures.insert(address, signatures);
    }

    pub fn set_holders(&self, owners: Vec<Pubkey>) {
        *self.holders.lock().unwrap() = owners;
    }

    pub fn fail_account_subscriptions(&self, fail: bool) {
        self.fail_account_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_logs_subscriptions(&self, fail: bool) {
        self.fail_logs_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_transaction_fetches(&self, fail: bool) {
        self.fail_transaction_fetch.store(fail, Ordering::SeqCst);
    }

    /// Number of subscriptions whose handles have not been released
    pub fn live_subscriptions(&self) -> usize {
        self.live.len()
    }

    /// Live subscriptions for one address
    pub fn live_subscriptions_for(&self, address: &Pubkey) -> usize {
        self.live
            .iter()
            .filter(|entry| entry.value().0 == *address)
            .count()
    }

    fn make_handle(&self, kind: SubscriptionKind, address: Pubkey) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.live.insert(id, (address, kind));
        let live = self.live.clone();
        SubscriptionHandle::new(id, kind, address, move || {
            live.remove(&id);
        })
    }
}

/// Build a successful token-transfer transaction for tests
pub fn token_transfer_tx(signature: &str, abs_balance_delta_lamports: u64) -> TransactionInfo {
    TransactionInfo {
        signature: signature.to_string(),
        slot: 1000,
        success: true,
        fee: 5000,
        program_ids: vec![spl_token::id()],
        abs_balance_delta_lamports,
        log_messages: vec!["Program log: Instruction: Transfer".to_string()],
    }
}

/// Build a plain system-transfer transaction for tests
pub fn system_transfer_tx(signature: &str, abs_balance_delta_lamports: u64) -> TransactionInfo {
    TransactionInfo {
        signature: signature.to_string(),
        slot: 1000,
        success: true,
        fee: 5000,
        program_ids: vec![system_program::id()],
        abs_balance_delta_lamports,
        log_messages: Vec::new(),
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountSnapshot>> {
        Ok(self.accounts.get(address).map(|a| a.clone()))
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        Ok(self.accounts.get(address).map(|a| a.lamports).unwrap_or(0))
    }

    async fn recent_signatures(&self, address: &Pubkey, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .signatures
            .get(address)
            .map(|s| s.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_transaction(&self, signature: &str) -> Result<Option<TransactionInfo>> {
        if self.fail_transaction_fetch.load(Ordering::SeqCst) {
            return Err(Error::Rpc("scripted fetch failure".to_string()));
        }
        Ok(self.transactions.get(signature).map(|t| t.clone()))
    }

    async fn token_holders(&self, _mint: &Pubkey, limit: usize) -> Result<Vec<Pubkey>> {
        Ok(self
            .holders
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .copied()
            .collect())
    }

    async fn subscribe_account(
        &self,
        address: Pubkey,
        _tx: mpsc::Sender<RawNotification>,
    ) -> Result<SubscriptionHandle> {
        if self.fail_account_subscribe.load(Ordering::SeqCst) {
            return Err(Error::Subscribe {
                address,
                reason: "scripted account-subscribe failure".to_string(),
            });
        }
        Ok(self.make_handle(SubscriptionKind::Account, address))
    }

    async fn subscribe_logs(
        &self,
        address: Pubkey,
        _tx: mpsc::Sender<RawNotification>,
    ) -> Result<SubscriptionHandle> {
        if self.fail_logs_subscribe.load(Ordering::SeqCst) {
            return Err(Error::Subscribe {
                address,
                reason: "scripted logs-subscribe failure".to_string(),
            });
        }
        Ok(self.make_handle(SubscriptionKind::Logs, address))
    }
}
