//! Significance classification
//!
//! Decides whether a normalized event crosses the configured value
//! threshold. The normalizer has already embedded the fetched transaction
//! facts, so classification is pure; fetch failures never get this far -
//! they fail normalization and the event is dropped (fail-closed).

use solana_sdk::native_token::lamports_to_sol;

use super::normalizer::{ActivityEvent, ActivityKind, TransactionType};

/// Verdict plus the measured value that produced it, kept for
/// observability and tests
#[derive(Debug, Clone, Copy)]
pub struct SignificanceVerdict {
    pub significant: bool,
    /// SOL moved by the event (absolute)
    pub measure_sol: f64,
}

/// Threshold-based classifier
#[derive(Debug, Clone)]
pub struct SignificanceClassifier {
    threshold_sol: f64,
}

impl SignificanceClassifier {
    pub fn new(threshold_sol: f64) -> Self {
        Self { threshold_sol }
    }

    pub fn classify(&self, event: &ActivityEvent) -> SignificanceVerdict {
        match &event.kind {
            ActivityKind::AccountChange(payload) => {
                let moved_sol = lamports_to_sol(payload.delta_lamports.unsigned_abs());
                SignificanceVerdict {
                    significant: moved_sol > self.threshold_sol,
                    measure_sol: moved_sol,
                }
            }
            ActivityKind::Transaction(payload) => {
                let moved_sol = lamports_to_sol(payload.abs_balance_delta_lamports);
                let token_transfer = payload.transaction_type == TransactionType::Token;
                SignificanceVerdict {
                    significant: token_transfer && moved_sol > self.threshold_sol,
                    measure_sol: moved_sol,
                }
            }
        }
    }
}
