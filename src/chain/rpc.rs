//! RPC-backed chain client
//!
//! Queries go through the nonblocking JSON-RPC client; notifications come
//! from one pubsub websocket task per subscription. Each task owns its own
//! connection, forwards updates into the worker channel, and performs the
//! websocket unsubscribe itself when its handle is released - so teardown
//! completes even if the releasing caller goes away.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcTransactionConfig,
    RpcTransactionLogsConfig, RpcTransactionLogsFilter,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::{
    EncodedTransaction, UiInstruction, UiMessage, UiParsedInstruction, UiTransactionEncoding,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::RpcConfig;
use crate::error::{Error, Result};

use super::types::{
    AccountSnapshot, RawNotification, SubscriptionHandle, SubscriptionKind, TransactionInfo,
};
use super::ChainClient;

/// Byte size of an SPL token account (spl_token::state::Account)
const TOKEN_ACCOUNT_SIZE: u64 = 165;

/// Chain client backed by Solana JSON-RPC and pubsub websockets
pub struct RpcChainClient {
    rpc: Arc<RpcClient>,
    ws_url: String,
    commitment: CommitmentConfig,
    next_sub_id: AtomicU64,
}

impl RpcChainClient {
    pub fn new(config: &RpcConfig) -> Self {
        let commitment = parse_commitment(&config.commitment);
        let rpc = RpcClient::new_with_timeout_and_commitment(
            config.endpoint(),
            Duration::from_millis(config.timeout_ms),
            commitment,
        );

        Self {
            rpc: Arc::new(rpc),
            ws_url: config.ws_endpoint(),
            commitment,
            next_sub_id: AtomicU64::new(1),
        }
    }

    /// RPC node version and current slot, for health checks
    pub async fn health(&self) -> Result<(String, u64)> {
        let version = self.rpc.get_version().await?;
        let slot = self.rpc.get_slot().await?;
        Ok((version.solana_core, slot))
    }

    fn next_id(&self) -> u64 {
        self.next_sub_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountSnapshot>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await?;

        Ok(response.value.map(|account| AccountSnapshot {
            lamports: account.lamports,
            owner: account.owner,
            executable: account.executable,
        }))
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        Ok(self.rpc.get_balance(address).await?)
    }

    async fn recent_signatures(&self, address: &Pubkey, limit: usize) -> Result<Vec<String>> {
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit),
            commitment: Some(self.commitment),
            ..Default::default()
        };

        let statuses = self
            .rpc
            .get_signatures_for_address_with_config(address, config)
            .await?;

        Ok(statuses.into_iter().map(|s| s.signature).collect())
    }

    async fn fetch_transaction(&self, signature: &str) -> Result<Option<TransactionInfo>> {
        let signature = Signature::from_str(signature)
            .map_err(|e| Error::InvalidAddress(format!("bad signature {}: {}", signature, e)))?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };

        let confirmed = self
            .rpc
            .get_transaction_with_config(&signature, config)
            .await?;

        let slot = confirmed.slot;
        let meta = match confirmed.transaction.meta {
            Some(meta) => meta,
            None => return Ok(None),
        };

        let program_ids = extract_program_ids(&confirmed.transaction.transaction);

        let abs_balance_delta_lamports: u64 = meta
            .pre_balances
            .iter()
            .zip(meta.post_balances.iter())
            .map(|(pre, post)| post.abs_diff(*pre))
            .sum();

        let log_messages: Vec<String> =
            Option::<Vec<String>>::from(meta.log_messages.clone()).unwrap_or_default();

        Ok(Some(TransactionInfo {
            signature: signature.to_string(),
            slot,
            success: meta.err.is_none(),
            fee: meta.fee,
            program_ids,
            abs_balance_delta_lamports,
            log_messages,
        }))
    }

    async fn token_holders(&self, mint: &Pubkey, limit: usize) -> Result<Vec<Pubkey>> {
        let filters = vec![
            RpcFilterType::DataSize(TOKEN_ACCOUNT_SIZE),
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(0, &mint.to_bytes())),
        ];

        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .rpc
            .get_program_accounts_with_config(&spl_token::id(), config)
            .await?;

        // Owners in discovery order, deduplicated, capped at `limit` token
        // accounts considered
        let mut seen = HashSet::new();
        let mut owners = Vec::new();
        for (token_account, account) in accounts.into_iter().take(limit) {
            match spl_token::state::Account::unpack(&account.data) {
                Ok(parsed) => {
                    if seen.insert(parsed.owner) {
                        owners.push(parsed.owner);
                    }
                }
                Err(e) => {
                    debug!(token_account = %token_account, "Skipping undecodable token account: {}", e);
                }
            }
        }

        Ok(owners)
    }

    async fn subscribe_account(
        &self,
        address: Pubkey,
        tx: mpsc::Sender<RawNotification>,
    ) -> Result<SubscriptionHandle> {
        let id = self.next_id();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::spawn(account_listener(
            self.ws_url.clone(),
            self.commitment,
            address,
            tx,
            ready_tx,
            stop_rx,
        ));

        await_ready(ready_rx, address).await?;

        Ok(SubscriptionHandle::new(
            id,
            SubscriptionKind::Account,
            address,
            move || {
                let _ = stop_tx.send(());
            },
        ))
    }

    async fn subscribe_logs(
        &self,
        address: Pubkey,
        tx: mpsc::Sender<RawNotification>,
    ) -> Result<SubscriptionHandle> {
        let id = self.next_id();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::spawn(logs_listener(
            self.ws_url.clone(),
            self.commitment,
            address,
            tx,
            ready_tx,
            stop_rx,
        ));

        await_ready(ready_rx, address).await?;

        Ok(SubscriptionHandle::new(
            id,
            SubscriptionKind::Logs,
            address,
            move || {
                let _ = stop_tx.send(());
            },
        ))
    }
}

/// Wait for a listener task to report its subscription outcome
async fn await_ready(
    ready_rx: oneshot::Receiver<std::result::Result<(), String>>,
    address: Pubkey,
) -> Result<()> {
    match ready_rx.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(Error::Subscribe { address, reason }),
        Err(_) => Err(Error::Subscribe {
            address,
            reason: "listener task exited before subscribing".to_string(),
        }),
    }
}

/// Listener task for one account-change subscription
async fn account_listener(
    ws_url: String,
    commitment: CommitmentConfig,
    address: Pubkey,
    tx: mpsc::Sender<RawNotification>,
    ready_tx: oneshot::Sender<std::result::Result<(), String>>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let client = match PubsubClient::new(&ws_url).await {
        Ok(client) => client,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("websocket connect failed: {}", e)));
            return;
        }
    };

    let config = RpcAccountInfoConfig {
        encoding: Some(UiAccountEncoding::Base64),
        commitment: Some(commitment),
        ..Default::default()
    };

    let (mut stream, unsubscribe) = match client.account_subscribe(&address, Some(config)).await {
        Ok(subscription) => subscription,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("account subscribe failed: {}", e)));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));
    debug!(address = %address, "Account subscription open");

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            update = stream.next() => match update {
                Some(update) => {
                    let notification = RawNotification::AccountChange {
                        address,
                        slot: update.context.slot,
                        lamports: update.value.lamports,
                        owner: update.value.owner.clone(),
                        executable: update.value.executable,
                    };
                    if tx.send(notification).await.is_err() {
                        debug!(address = %address, "Notification channel closed");
                        break;
                    }
                }
                None => {
                    warn!(address = %address, "Account subscription stream ended");
                    break;
                }
            }
        }
    }

    drop(stream);
    unsubscribe().await;
    debug!(address = %address, "Account subscription closed");
}

/// Listener task for one logs subscription
async fn logs_listener(
    ws_url: String,
    commitment: CommitmentConfig,
    address: Pubkey,
    tx: mpsc::Sender<RawNotification>,
    ready_tx: oneshot::Sender<std::result::Result<(), String>>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let client = match PubsubClient::new(&ws_url).await {
        Ok(client) => client,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("websocket connect failed: {}", e)));
            return;
        }
    };

    let filter = RpcTransactionLogsFilter::Mentions(vec![address.to_string()]);
    let config = RpcTransactionLogsConfig {
        commitment: Some(commitment),
    };

    let (mut stream, unsubscribe) = match client.logs_subscribe(filter, config).await {
        Ok(subscription) => subscription,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("logs subscribe failed: {}", e)));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));
    debug!(address = %address, "Logs subscription open");

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            update = stream.next() => match update {
                Some(update) => {
                    let notification = RawNotification::Logs {
                        address,
                        slot: update.context.slot,
                        signature: Some(update.value.signature.clone()),
                        logs: update.value.logs.clone(),
                        failed: update.value.err.is_some(),
                    };
                    if tx.send(notification).await.is_err() {
                        debug!(address = %address, "Notification channel closed");
                        break;
                    }
                }
                None => {
                    warn!(address = %address, "Logs subscription stream ended");
                    break;
                }
            }
        }
    }

    drop(stream);
    unsubscribe().await;
    debug!(address = %address, "Logs subscription closed");
}

/// Program ids of every top-level instruction in a parsed transaction
fn extract_program_ids(transaction: &EncodedTransaction) -> Vec<Pubkey> {
    let message = match transaction {
        EncodedTransaction::Json(ui_transaction) => &ui_transaction.message,
        _ => return Vec::new(),
    };

    let instructions = match message {
        UiMessage::Parsed(parsed) => &parsed.instructions,
        UiMessage::Raw(_) => return Vec::new(),
    };

    instructions
        .iter()
        .filter_map(|instruction| {
            let program_id = match instruction {
                UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => &parsed.program_id,
                UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(decoded)) => {
                    &decoded.program_id
                }
                UiInstruction::Compiled(_) => return None,
            };
            Pubkey::from_str(program_id).ok()
        })
        .collect()
}

fn parse_commitment(level: &str) -> CommitmentConfig {
    match level {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        _ => CommitmentConfig::confirmed(),
    }
}
