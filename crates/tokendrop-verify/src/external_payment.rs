//! External-payment verification.
//!
//! The claimant proves eligibility by referencing a confirmed ledger
//! transaction in which they paid at least the configured minimum to the
//! treasury. The lookup goes through [`LedgerClient::fetch_payment`] and is
//! never retried here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokendrop_types::{AccountRef, ClaimIdentity, LedgerClient, VerificationError};

/// Verifies payment references against the ledger.
#[derive(Debug, Clone)]
pub struct ExternalPaymentVerifier {
    treasury: AccountRef,
    /// Lamports.
    min_payment: u64,
    staleness: Duration,
}

impl ExternalPaymentVerifier {
    #[must_use]
    pub fn new(treasury: AccountRef, min_payment: u64, staleness: Duration) -> Self {
        Self {
            treasury,
            min_payment,
            staleness,
        }
    }

    #[must_use]
    pub fn treasury(&self) -> &AccountRef {
        &self.treasury
    }

    /// Returns the lamports paid to the treasury on success.
    pub async fn verify(
        &self,
        identity: &ClaimIdentity,
        reference: &str,
        ledger: &dyn LedgerClient,
        now: DateTime<Utc>,
    ) -> Result<u64, VerificationError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(VerificationError::bad_format("empty transaction reference"));
        }

        let payment = match ledger.fetch_payment(reference).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                return Err(VerificationError::payment_not_verified("transaction not found"));
            }
            Err(e) => {
                tracing::warn!(reference, error = %e, "Payment lookup failed");
                return Err(VerificationError::payment_not_verified(format!(
                    "ledger lookup failed: {e}"
                )));
            }
        };

        if !payment.succeeded {
            return Err(VerificationError::payment_not_verified("transaction failed on-chain"));
        }

        let payer = identity.as_account();
        let paid = payment
            .transfers
            .iter()
            .filter(|t| t.from == payer && t.to == self.treasury)
            .fold(0u64, |acc, t| acc.saturating_add(t.amount));

        if paid == 0 {
            return Err(VerificationError::payment_not_verified(
                "no transfer from claimant to treasury",
            ));
        }
        if paid < self.min_payment {
            return Err(VerificationError::payment_not_verified(format!(
                "paid {paid} lamports, minimum is {}",
                self.min_payment
            )));
        }

        let Some(block_time) = payment.block_time else {
            return Err(VerificationError::payment_not_verified("transaction has no block time"));
        };
        let max_age = chrono::Duration::from_std(self.staleness).unwrap_or(chrono::Duration::MAX);
        if now.signed_duration_since(block_time) > max_age {
            return Err(VerificationError::PaymentTooOld);
        }

        Ok(paid)
    }
}
