//! Wallet validity checks
//!
//! A wallet is accepted for monitoring only if the account exists, is a
//! plain system-owned account (not a program, not a token account) and
//! carries at least the configured minimum balance.

use solana_sdk::native_token::{lamports_to_sol, sol_to_lamports};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use tracing::{debug, warn};

use crate::chain::{AccountSnapshot, ChainClient};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct WalletValidator {
    min_balance_lamports: u64,
}

impl WalletValidator {
    pub fn new(min_balance_sol: f64) -> Self {
        Self {
            min_balance_lamports: sol_to_lamports(min_balance_sol),
        }
    }

    /// Check an address against the acceptance rules, returning its snapshot
    /// on success so callers can reuse the fetched balance.
    pub async fn check(&self, chain: &dyn ChainClient, address: &Pubkey) -> Result<AccountSnapshot> {
        let snapshot = chain
            .get_account(address)
            .await?
            .ok_or_else(|| Error::Validation(format!("account {} does not exist", address)))?;

        if snapshot.owner != system_program::id() {
            return Err(Error::Validation(format!(
                "account {} is owned by {}, not the system program",
                address, snapshot.owner
            )));
        }

        if snapshot.executable {
            return Err(Error::Validation(format!(
                "account {} is executable",
                address
            )));
        }

        if snapshot.lamports < self.min_balance_lamports {
            return Err(Error::Validation(format!(
                "account {} holds {} SOL, below the {} SOL minimum",
                address,
                lamports_to_sol(snapshot.lamports),
                lamports_to_sol(self.min_balance_lamports)
            )));
        }

        debug!(address = %address, lamports = snapshot.lamports, "Wallet passed validation");
        Ok(snapshot)
    }

    /// Boolean form of `check`; RPC failures count as invalid
    pub async fn is_valid_wallet(&self, chain: &dyn ChainClient, address: &Pubkey) -> bool {
        match self.check(chain, address).await {
            Ok(_) => true,
            Err(e) => {
                warn!(address = %address, error = %e, "Wallet failed validation");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainClient;
    use solana_sdk::native_token::LAMPORTS_PER_SOL;

    #[tokio::test]
    async fn test_valid_system_wallet() {
        let chain = MockChainClient::new();
        let address = Pubkey::new_unique();
        chain.add_system_wallet(address, LAMPORTS_PER_SOL);

        let validator = WalletValidator::new(0.01);
        let snapshot = validator.check(&chain, &address).await.unwrap();
        assert_eq!(snapshot.lamports, LAMPORTS_PER_SOL);
        assert!(validator.is_valid_wallet(&chain, &address).await);
    }

    #[tokio::test]
    async fn test_missing_account_is_invalid() {
        let chain = MockChainClient::new();
        let validator = WalletValidator::new(0.01);
        let address = Pubkey::new_unique();

        assert!(matches!(
            validator.check(&chain, &address).await,
            Err(Error::Validation(_))
        ));
        assert!(!validator.is_valid_wallet(&chain, &address).await);
    }

    #[tokio::test]
    async fn test_program_owned_account_is_invalid() {
        let chain = MockChainClient::new();
        let address = Pubkey::new_unique();
        chain.add_account(address, LAMPORTS_PER_SOL, spl_token::id(), false);

        let validator = WalletValidator::new(0.01);
        assert!(!validator.is_valid_wallet(&chain, &address).await);
    }

    #[tokio::test]
    async fn test_balance_below_minimum_is_invalid() {
        let chain = MockChainClient::new();
        let address = Pubkey::new_unique();
        // 0.005 SOL against a 0.01 SOL minimum
        chain.add_system_wallet(address, LAMPORTS_PER_SOL / 200);

        let validator = WalletValidator::new(0.01);
        assert!(!validator.is_valid_wallet(&chain, &address).await);

        // Exactly at the minimum is accepted
        let at_min = Pubkey::new_unique();
        chain.add_system_wallet(at_min, LAMPORTS_PER_SOL / 100);
        assert!(validator.is_valid_wallet(&chain, &at_min).await);
    }
}
