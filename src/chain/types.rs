//! Wire-level types shared between chain client implementations

use solana_sdk::pubkey::Pubkey;

/// Point-in-time view of an account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub lamports: u64,
    pub owner: Pubkey,
    pub executable: bool,
}

/// Flattened view of a parsed transaction
///
/// Built once at fetch time so normalization and classification never have to
/// walk the full parsed-transaction tree again.
#[derive(Debug, Clone)]
pub struct TransactionInfo {
    pub signature: String,
    pub slot: u64,
    pub success: bool,
    pub fee: u64,
    /// Program ids of every top-level instruction
    pub program_ids: Vec<Pubkey>,
    /// Sum of `|post - pre|` balance over all accounts, in lamports
    pub abs_balance_delta_lamports: u64,
    pub log_messages: Vec<String>,
}

/// Raw notification as delivered by a chain subscription
#[derive(Debug, Clone)]
pub enum RawNotification {
    /// The subscribed account changed (balance, owner, data, ...)
    AccountChange {
        address: Pubkey,
        slot: u64,
        lamports: u64,
        owner: String,
        executable: bool,
    },
    /// A transaction mentioning the subscribed address produced logs.
    /// `signature` is present on real pubsub streams; the normalizer falls
    /// back to a recent-signature query when it is missing.
    Logs {
        address: Pubkey,
        slot: u64,
        signature: Option<String>,
        logs: Vec<String>,
        failed: bool,
    },
}

impl RawNotification {
    /// Address this notification belongs to
    pub fn address(&self) -> &Pubkey {
        match self {
            RawNotification::AccountChange { address, .. } => address,
            RawNotification::Logs { address, .. } => address,
        }
    }
}

/// Which half of a wallet's subscription pair a handle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Account,
    Logs,
}

/// Owned handle to one live subscription.
///
/// Dropping (or explicitly releasing) the handle signals the subscription
/// task to unsubscribe and exit. The signal is synchronous and cannot fail;
/// the network-side teardown completes in the detached task even if the
/// releasing caller is cancelled immediately afterwards.
pub struct SubscriptionHandle {
    id: u64,
    kind: SubscriptionKind,
    address: Pubkey,
    on_release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SubscriptionHandle {
    pub fn new(
        id: u64,
        kind: SubscriptionKind,
        address: Pubkey,
        on_release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            kind,
            address,
            on_release: Some(Box::new(on_release)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    pub fn address(&self) -> &Pubkey {
        &self.address
    }

    /// Release the subscription. Equivalent to dropping the handle, spelled
    /// out at call sites where the release is the point.
    pub fn release(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(f) = self.on_release.take() {
            f();
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("address", &self.address)
            .finish()
    }
}
