//! Error types for the wallet monitor

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet monitor
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    // Address / wallet errors
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Wallet validation failed: {0}")]
    Validation(String),

    // Subscription lifecycle errors
    #[error("Already monitoring wallet: {0}")]
    AlreadyMonitored(Pubkey),

    #[error("Wallet is not monitored: {0}")]
    NotMonitored(Pubkey),

    #[error("Subscription failed for {address}: {reason}")]
    Subscribe { address: Pubkey, reason: String },

    // Event pipeline errors
    #[error("Normalization failed: {0}")]
    Normalization(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::RpcConnection(_) | Error::Subscribe { .. }
        )
    }

    /// Check if this error only concerns a single wallet (the sweep or the
    /// caller can carry on with the rest of the watch set)
    pub fn is_per_wallet(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress(_)
                | Error::Validation(_)
                | Error::AlreadyMonitored(_)
                | Error::NotMonitored(_)
                | Error::Subscribe { .. }
                | Error::Normalization(_)
                | Error::Classification(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
