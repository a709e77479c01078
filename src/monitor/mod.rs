//! Wallet activity monitoring subsystem
//!
//! Pipeline: chain notification -> normalizer -> classifier -> event bus.
//! The registry owns all live subscriptions; the reaper evicts wallets that
//! go quiet for longer than the configured TTL.

pub mod classifier;
pub mod events;
pub mod holders;
pub mod normalizer;
pub mod reaper;
pub mod registry;
pub mod validator;
pub mod watchset;

pub use classifier::{SignificanceClassifier, SignificanceVerdict};
pub use events::{EventBus, SignificantActivity};
pub use normalizer::{ActivityEvent, ActivityKind, TransactionType};
pub use registry::SubscriptionRegistry;
pub use validator::WalletValidator;
pub use watchset::WalletMonitor;
