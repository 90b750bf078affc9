//! Outcome of a disbursement request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountRef, AssetId, ClaimIdentity, ClaimRecord, TransactionId};

/// Proof that a disbursement landed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementReceipt {
    pub identity: ClaimIdentity,
    pub transaction_id: TransactionId,
    pub asset: AssetId,
    /// Destination token account.
    pub destination: AccountRef,
    /// Amount in base units.
    pub amount: u64,
    pub decimals: u8,
    /// Whether the destination token account was created by this transfer.
    pub created_destination: bool,
    pub finalized_at: DateTime<Utc>,
}

/// What the service did with a verified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisbursementOutcome {
    /// Tokens were sent.
    Disbursed(DisbursementReceipt),
    /// The identity already holds a LOCKED or FINALIZED claim. Not an error.
    AlreadyClaimed {
        /// The existing record, when the store could return it.
        existing: Option<ClaimRecord>,
    },
}

impl DisbursementOutcome {
    #[must_use]
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match self {
            Self::Disbursed(receipt) => Some(&receipt.transaction_id),
            Self::AlreadyClaimed { .. } => None,
        }
    }

    #[must_use]
    pub fn is_already_claimed(&self) -> bool {
        matches!(self, Self::AlreadyClaimed { .. })
    }
}
