//! Wallet Radar Library
//!
//! Watches Solana wallet addresses, classifies their on-chain activity and
//! emits significant events to downstream consumers.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod monitor;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
