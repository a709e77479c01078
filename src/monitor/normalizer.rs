//! Activity normalization
//!
//! Converts raw chain notifications into the canonical `ActivityEvent`
//! shape. Account changes normalize without I/O; log notifications need a
//! secondary fetch of the parsed transaction, because the log stream carries
//! no structured transaction body. The fetch uses the notification's own
//! signature - the "most recent signature" query is only a fallback when the
//! notification has none, since re-deriving it can pick up an unrelated,
//! newer transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use tokio::time::Instant;

use crate::chain::ChainClient;
use crate::error::{Error, Result};

/// Classification tag derived from a transaction's instruction programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// At least one instruction targets the SPL token program
    Token,
    /// System-program activity only (transfers, account creation)
    System,
    /// Anything unrecognized
    Other,
}

/// Payload of an account-change event
#[derive(Debug, Clone, Serialize)]
pub struct AccountChangePayload {
    /// Balance after the change
    pub lamports: u64,
    /// Change versus the previously observed balance
    pub delta_lamports: i64,
    pub owner: String,
    pub executable: bool,
}

/// Payload of a transaction event
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPayload {
    pub signature: String,
    pub transaction_type: TransactionType,
    pub success: bool,
    pub fee: u64,
    /// Sum of `|post - pre|` balance over all accounts, in lamports
    pub abs_balance_delta_lamports: u64,
    pub program_ids: Vec<Pubkey>,
    pub log_messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ActivityKind {
    AccountChange(AccountChangePayload),
    Transaction(TransactionPayload),
}

/// Normalized activity record, immutable once constructed
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub address: Pubkey,
    pub slot: u64,
    pub kind: ActivityKind,
    pub timestamp: DateTime<Utc>,
    /// Monotonic receipt time, for TTL math
    pub received_at: Instant,
}

impl ActivityEvent {
    fn new(address: Pubkey, slot: u64, kind: ActivityKind) -> Self {
        Self {
            address,
            slot,
            kind,
            timestamp: Utc::now(),
            received_at: Instant::now(),
        }
    }
}

/// Normalize an account-change notification. Pure - all fields are copied
/// verbatim; the delta is supplied by the registry's balance tracking.
pub fn normalize_account_change(
    address: Pubkey,
    slot: u64,
    lamports: u64,
    delta_lamports: i64,
    owner: String,
    executable: bool,
) -> ActivityEvent {
    ActivityEvent::new(
        address,
        slot,
        ActivityKind::AccountChange(AccountChangePayload {
            lamports,
            delta_lamports,
            owner,
            executable,
        }),
    )
}

/// Normalize a log notification by fetching the transaction it refers to.
///
/// Fails (and the caller drops the notification, without retry) when no
/// signature can be determined or the transaction has no parsed body.
pub async fn normalize_logs(
    chain: &dyn ChainClient,
    address: Pubkey,
    slot: u64,
    signature: Option<&str>,
) -> Result<ActivityEvent> {
    let signature = match signature {
        Some(signature) => signature.to_string(),
        None => chain
            .recent_signatures(&address, 1)
            .await
            .map_err(|e| Error::Normalization(format!("signature lookup for {}: {}", address, e)))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::Normalization(format!("no recent signature for {}", address))
            })?,
    };

    let info = chain
        .fetch_transaction(&signature)
        .await
        .map_err(|e| Error::Normalization(format!("fetch of {}: {}", signature, e)))?
        .ok_or_else(|| Error::Normalization(format!("transaction {} has no body", signature)))?;

    let transaction_type = derive_transaction_type(&info.program_ids);

    Ok(ActivityEvent::new(
        address,
        slot.max(info.slot),
        ActivityKind::Transaction(TransactionPayload {
            signature: info.signature,
            transaction_type,
            success: info.success,
            fee: info.fee,
            abs_balance_delta_lamports: info.abs_balance_delta_lamports,
            program_ids: info.program_ids,
            log_messages: info.log_messages,
        }),
    ))
}

/// Fixed classification table: token program wins over system program,
/// anything unrecognized is `Other`.
pub fn derive_transaction_type(program_ids: &[Pubkey]) -> TransactionType {
    if program_ids.iter().any(|id| *id == spl_token::id()) {
        TransactionType::Token
    } else if program_ids.iter().any(|id| *id == system_program::id()) {
        TransactionType::System
    } else {
        TransactionType::Other
    }
}
