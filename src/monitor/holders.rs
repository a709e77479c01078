//! Top-holder discovery
//!
//! Seeds the watch set from the holders of a token mint: scan the mint's
//! largest token accounts, resolve their owner wallets, and start
//! monitoring every owner that passes validation.

use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::error::Result;

use super::watchset::WalletMonitor;

impl WalletMonitor {
    /// Discover holder wallets of `mint` and add them to the watch set.
    ///
    /// At most `holder_scan_limit` holder accounts are considered. Wallets
    /// that fail validation or are already monitored are skipped with a
    /// warning; the scan continues. Returns the wallets actually started,
    /// in scan order.
    pub async fn watch_top_holders(&self, mint: &Pubkey) -> Result<Vec<Pubkey>> {
        let limit = self.config().holder_scan_limit;
        let holders = self.chain().token_holders(mint, limit).await?;
        info!(mint = %mint, candidates = holders.len(), "Scanned token holders");

        let mut started = Vec::new();
        for owner in holders {
            match self.add_wallet(owner).await {
                Ok(()) => started.push(owner),
                Err(e) => {
                    warn!(mint = %mint, address = %owner, error = %e, "Skipping holder");
                }
            }
        }

        info!(
            mint = %mint,
            started = started.len(),
            "Holder discovery finished"
        );
        Ok(started)
    }
}
