//! Disbursement requests and the proofs that authorize them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ClaimIdentity;

/// Caller-supplied authorization for a disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Proof {
    /// `message` signed by the claimant's wallet key.
    SignedMessage {
        message: String,
        #[serde(rename = "signatureBase64")]
        signature_base64: String,
    },
    /// Reference (signature) of a payment transaction sent by the claimant.
    ExternalPayment {
        #[serde(rename = "externalTransactionReference")]
        external_transaction_reference: String,
    },
}

impl Proof {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignedMessage { .. } => "signed_message",
            Self::ExternalPayment { .. } => "external_payment",
        }
    }
}

/// A single request for the one-time disbursement of `identity`.
///
/// The amount is never caller-controlled; it comes from the asset config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementRequest {
    pub identity: ClaimIdentity,
    pub proof: Option<Proof>,
}

impl DisbursementRequest {
    #[must_use]
    pub fn new(identity: ClaimIdentity, proof: Option<Proof>) -> Self {
        Self { identity, proof }
    }
}

/// How a claim was authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationMethod {
    SignedMessage {
        /// Unix timestamp carried by the message.
        issued_at: i64,
    },
    ExternalPayment {
        reference: String,
        /// Lamports paid to the treasury.
        paid: u64,
    },
}

/// Output of a successful authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedClaim {
    pub identity: ClaimIdentity,
    pub method: VerificationMethod,
    pub verified_at: DateTime<Utc>,
}
