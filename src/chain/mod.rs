//! Chain access layer
//!
//! `ChainClient` is the single seam between the monitoring subsystem and the
//! network. Production code uses `RpcChainClient`; tests script a mock.

pub mod rpc;
pub mod types;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;

use crate::error::Result;

pub use rpc::RpcChainClient;
pub use types::{
    AccountSnapshot, RawNotification, SubscriptionHandle, SubscriptionKind, TransactionInfo,
};

/// Capability to query chain state and subscribe to per-address notifications.
///
/// Subscriptions deliver `RawNotification`s into the caller-supplied channel
/// and hand back a `SubscriptionHandle`; releasing the handle detaches the
/// listener. The release itself is synchronous and always runs to
/// completion - the network-side unsubscribe happens in the subscription's
/// own task.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch an account, `None` if it does not exist
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountSnapshot>>;

    /// Fetch an account balance in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    /// Most recent transaction signatures for an address, newest first
    async fn recent_signatures(&self, address: &Pubkey, limit: usize) -> Result<Vec<String>>;

    /// Fetch and flatten a parsed transaction, `None` if no usable body
    async fn fetch_transaction(&self, signature: &str) -> Result<Option<TransactionInfo>>;

    /// Owner wallets of the largest token accounts for a mint, capped at `limit`
    async fn token_holders(&self, mint: &Pubkey, limit: usize) -> Result<Vec<Pubkey>>;

    /// Subscribe to account-change notifications for an address
    async fn subscribe_account(
        &self,
        address: Pubkey,
        tx: mpsc::Sender<RawNotification>,
    ) -> Result<SubscriptionHandle>;

    /// Subscribe to log notifications mentioning an address
    async fn subscribe_logs(
        &self,
        address: Pubkey,
        tx: mpsc::Sender<RawNotification>,
    ) -> Result<SubscriptionHandle>;
}
