//! Error types for the TokenDrop disbursement service.
//!
//! All errors use the `TD_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Verification errors (caller's fault, reported as client errors)
//! - 2xx: Claim store / claim lock errors
//! - 3xx: Ledger errors (trigger claim release)
//! - 4xx: Configuration errors (fatal at startup)
//! - 9xx: General / internal errors
//!
//! Verification errors carry a stable [`VerificationError::reason_code`]
//! that is returned verbatim in HTTP responses.

use thiserror::Error;

use crate::ClaimState;

// =================================================================
// Verification Errors (1xx)
// =================================================================

/// Why a caller's authorization proof was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The request or message does not match the expected shape.
    #[error("TD_ERR_100: Bad format: {reason}")]
    BadFormat { reason: String },

    /// The identity inside the signed message is not the requesting identity.
    #[error("TD_ERR_101: Message identity does not match the claimant")]
    BuyerMismatch,

    /// The signature did not verify against the claimant's public key.
    #[error("TD_ERR_102: Signature verification failed")]
    InvalidSignature,

    /// The signed message timestamp is outside the freshness window.
    #[error("TD_ERR_103: Signed message expired")]
    MessageExpired,

    /// The referenced payment does not satisfy the payment policy.
    #[error("TD_ERR_104: Payment not verified: {reason}")]
    PaymentNotVerified { reason: String },

    /// The referenced payment is older than the staleness window.
    #[error("TD_ERR_105: Payment too old")]
    PaymentTooOld,
}

impl VerificationError {
    /// Stable reason code reported to callers.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::BadFormat { .. } => "BadFormat",
            Self::BuyerMismatch => "BuyerMismatch",
            Self::InvalidSignature => "InvalidSignature",
            Self::MessageExpired => "MessageExpired",
            Self::PaymentNotVerified { .. } => "PaymentNotVerified",
            Self::PaymentTooOld => "PaymentTooOld",
        }
    }

    pub fn bad_format(reason: impl Into<String>) -> Self {
        Self::BadFormat {
            reason: reason.into(),
        }
    }

    pub fn payment_not_verified(reason: impl Into<String>) -> Self {
        Self::PaymentNotVerified {
            reason: reason.into(),
        }
    }
}

// =================================================================
// Claim Errors (2xx)
// =================================================================

/// Claim store backend or claim record lifecycle failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The store could not be reached or the operation failed.
    #[error("TD_ERR_200: Claim store backend error: {reason}")]
    Backend { reason: String },

    /// A stored claim record could not be (de)serialized.
    #[error("TD_ERR_201: Claim record serialization error: {reason}")]
    Serialization { reason: String },

    /// A claim record was asked to make an illegal state transition.
    #[error("TD_ERR_202: Invalid claim transition from {from} to {to}")]
    InvalidTransition { from: ClaimState, to: ClaimState },
}

impl ClaimError {
    pub fn backend(reason: impl std::fmt::Display) -> Self {
        Self::Backend {
            reason: reason.to_string(),
        }
    }
}

// =================================================================
// Ledger Errors (3xx)
// =================================================================

/// Failure while moving value on the ledger. Always releases the claim lock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Source or destination token account could not be resolved or created.
    #[error("TD_ERR_300: Account resolution failed: {reason}")]
    AccountResolutionFailed { reason: String },

    /// The transaction was rejected at submission or failed on-chain.
    #[error("TD_ERR_301: Transaction submission failed: {reason}")]
    SubmissionFailed { reason: String },

    /// No confirmation arrived within the transfer timeout.
    #[error("TD_ERR_302: Confirmation timed out after {after_ms}ms")]
    ConfirmationTimeout { after_ms: u64 },

    /// The treasury token account cannot cover the transfer.
    #[error("TD_ERR_303: Insufficient treasury funds: need {needed}, have {available}")]
    InsufficientTreasuryFunds { needed: u64, available: u64 },

    /// `amount × 10^decimals` does not fit the ledger's integer unit.
    #[error("TD_ERR_304: Amount overflow: {amount} with {decimals} decimals")]
    AmountOverflow { amount: String, decimals: u8 },

    /// The ledger endpoint could not be queried.
    #[error("TD_ERR_305: Ledger query failed: {reason}")]
    QueryFailed { reason: String },
}

impl LedgerError {
    pub fn submission(reason: impl std::fmt::Display) -> Self {
        Self::SubmissionFailed {
            reason: reason.to_string(),
        }
    }

    pub fn resolution(reason: impl std::fmt::Display) -> Self {
        Self::AccountResolutionFailed {
            reason: reason.to_string(),
        }
    }
}

// =================================================================
// Configuration Errors (4xx)
// =================================================================

/// Invalid or missing startup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `SIGNING_CREDENTIAL` is not set.
    #[error("TD_ERR_400: Missing signing credential (SIGNING_CREDENTIAL)")]
    MissingCredential,

    /// `SIGNING_CREDENTIAL` is set but cannot be decoded into a keypair.
    #[error("TD_ERR_401: Invalid signing credential format: {reason}")]
    InvalidCredentialFormat { reason: String },

    /// A required asset setting is absent.
    #[error("TD_ERR_402: Missing asset configuration: {field}")]
    MissingAssetConfig { field: &'static str },

    /// A setting is present but unusable.
    #[error("TD_ERR_403: Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Invalid {
            field,
            reason: reason.to_string(),
        }
    }
}

// =================================================================
// Top level
// =================================================================

/// Central error enum for all TokenDrop operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokendropError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable internal error.
    #[error("TD_ERR_900: Internal error: {0}")]
    Internal(String),
}

impl TokendropError {
    /// Whether the caller is at fault (reported as HTTP 400).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TokendropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(VerificationError::bad_format("x").reason_code(), "BadFormat");
        assert_eq!(VerificationError::BuyerMismatch.reason_code(), "BuyerMismatch");
        assert_eq!(VerificationError::InvalidSignature.reason_code(), "InvalidSignature");
        assert_eq!(VerificationError::MessageExpired.reason_code(), "MessageExpired");
        assert_eq!(
            VerificationError::payment_not_verified("x").reason_code(),
            "PaymentNotVerified"
        );
        assert_eq!(VerificationError::PaymentTooOld.reason_code(), "PaymentTooOld");
    }

    #[test]
    fn insufficient_funds_display() {
        let err = LedgerError::InsufficientTreasuryFunds {
            needed: 250,
            available: 10,
        };
        let msg = format!("{err}");
        assert!(msg.contains("TD_ERR_303"));
        assert!(msg.contains("250"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn transparent_wrapper_keeps_code() {
        let err: TokendropError = LedgerError::ConfirmationTimeout { after_ms: 5 }.into();
        assert!(format!("{err}").starts_with("TD_ERR_302"));
        assert!(!err.is_client_error());

        let err: TokendropError = VerificationError::MessageExpired.into();
        assert!(err.is_client_error());
    }

    #[test]
    fn all_errors_have_td_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(VerificationError::InvalidSignature),
            Box::new(ClaimError::backend("disk full")),
            Box::new(ClaimError::InvalidTransition {
                from: ClaimState::Finalized,
                to: ClaimState::Locked,
            }),
            Box::new(LedgerError::submission("blockhash not found")),
            Box::new(ConfigError::MissingCredential),
            Box::new(TokendropError::Internal("test".into())),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("TD_ERR_"),
                "Error missing TD_ERR_ prefix: {msg}"
            );
        }
    }
}
