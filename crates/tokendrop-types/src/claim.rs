//! # Claim records: the at-most-once primitive
//!
//! A `ClaimRecord` is written under the key `claim:<identity>` the moment a
//! disbursement is admitted, and it is the only thing standing between a
//! claimant and a second payout.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐  transfer confirmed  ┌───────────┐
//!   │ LOCKED ├─────────────────────▶│ FINALIZED │
//!   └───┬────┘                      └───────────┘
//!       │ transfer failed / lock ttl elapsed
//!       ▼
//!   (record deleted, identity may retry)
//! ```
//!
//! Transitions are monotonic: a FINALIZED record never returns to LOCKED.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ClaimError, ClaimIdentity, TransactionId, constants};

/// The lifecycle state of a stored claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimState {
    /// A disbursement is in flight for this identity.
    Locked,
    /// The disbursement landed on the ledger. **Irreversible.**
    Finalized,
}

impl ClaimState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Locked, Self::Finalized))
    }
}

impl fmt::Display for ClaimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "LOCKED"),
            Self::Finalized => write!(f, "FINALIZED"),
        }
    }
}

/// Persistent record of "identity X has (or is receiving) its disbursement".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub identity: ClaimIdentity,
    pub state: ClaimState,
    /// When the lock was acquired.
    pub locked_at: DateTime<Utc>,
    /// Unique per acquisition. Only the holder that wrote a LOCKED record
    /// may finalize or release it.
    #[serde(default)]
    pub lock_id: Uuid,
    /// When the disbursement was confirmed.
    pub finalized_at: Option<DateTime<Utc>>,
    /// Ledger transaction that paid this claim.
    pub transaction_id: Option<TransactionId>,
}

impl ClaimRecord {
    /// A fresh LOCKED record.
    #[must_use]
    pub fn locked(identity: ClaimIdentity, at: DateTime<Utc>) -> Self {
        Self {
            identity,
            state: ClaimState::Locked,
            locked_at: at,
            lock_id: Uuid::now_v7(),
            finalized_at: None,
            transaction_id: None,
        }
    }

    /// Store key for an identity. No other component may write this key.
    #[must_use]
    pub fn store_key(identity: &ClaimIdentity) -> String {
        format!("{}{}", constants::CLAIM_KEY_PREFIX, identity.as_str())
    }

    /// Attempt the LOCKED → FINALIZED transition.
    ///
    /// # Errors
    /// Returns [`ClaimError::InvalidTransition`] if already finalized.
    pub fn mark_finalized(
        &mut self,
        transaction_id: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        if !self.state.can_transition_to(ClaimState::Finalized) {
            return Err(ClaimError::InvalidTransition {
                from: self.state,
                to: ClaimState::Finalized,
            });
        }
        self.state = ClaimState::Finalized;
        self.finalized_at = Some(at);
        self.transaction_id = Some(transaction_id);
        Ok(())
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state == ClaimState::Finalized
    }

    /// Whether this is the LOCKED record written by the acquisition `held`.
    #[must_use]
    pub fn is_lock_of(&self, held: &ClaimRecord) -> bool {
        self.state == ClaimState::Locked && self.lock_id == held.lock_id && self.identity == held.identity
    }
}

/// Where a single disbursement request currently is.
///
/// ```text
/// Received → Verifying → Locking → Transferring → Finalized
///               │           │            │
///               ▼           ▼            ▼
///           Rejected   LockConflict    Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisbursementStage {
    Received,
    Verifying,
    Locking,
    Transferring,
    Finalized,
    Rejected,
    LockConflict,
    Failed,
}

impl DisbursementStage {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Received, Self::Verifying)
                | (Self::Verifying, Self::Locking | Self::Rejected)
                | (Self::Locking, Self::Transferring | Self::LockConflict | Self::Failed)
                | (Self::Transferring, Self::Finalized | Self::Failed)
        )
    }

    /// Terminal stages end the request.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finalized | Self::Rejected | Self::LockConflict | Self::Failed
        )
    }
}

impl fmt::Display for DisbursementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::Verifying => "VERIFYING",
            Self::Locking => "LOCKING",
            Self::Transferring => "TRANSFERRING",
            Self::Finalized => "FINALIZED",
            Self::Rejected => "REJECTED",
            Self::LockConflict => "LOCK_CONFLICT",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
