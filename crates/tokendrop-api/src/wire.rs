//! JSON shapes of the claim endpoint.

use serde::{Deserialize, Serialize};
use tokendrop_types::{ClaimIdentity, DisbursementRequest, Proof, VerificationError};

/// Claim request body.
///
/// Accepts both the nested form
/// `{"identity": .., "proof": {"message": .., "signatureBase64": ..}}`
/// and the flat form `{"buyer": .., "message": .., "signatureBase64": ..}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBody {
    #[serde(alias = "buyer")]
    pub identity: Option<String>,
    pub proof: Option<Proof>,
    pub message: Option<String>,
    pub signature_base64: Option<String>,
    pub external_transaction_reference: Option<String>,
}

impl ClaimBody {
    /// Parse raw request bytes. Any decoding problem is `BadFormat`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VerificationError> {
        serde_json::from_slice(bytes).map_err(|e| VerificationError::bad_format(format!("invalid JSON body: {e}")))
    }

    pub fn into_request(self) -> Result<DisbursementRequest, VerificationError> {
        let raw = self
            .identity
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| VerificationError::bad_format("missing identity"))?;
        let identity = ClaimIdentity::parse(&raw).map_err(VerificationError::bad_format)?;

        let proof = match (self.proof, self.message, self.signature_base64, self.external_transaction_reference) {
            (Some(proof), ..) => Some(proof),
            (None, Some(message), Some(signature_base64), _) => Some(Proof::SignedMessage {
                message,
                signature_base64,
            }),
            (None, _, _, Some(external_transaction_reference)) => Some(Proof::ExternalPayment {
                external_transaction_reference,
            }),
            _ => None,
        };

        Ok(DisbursementRequest::new(identity, proof))
    }
}

/// Claim response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub already_claimed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClaimResponse {
    pub fn disbursed(transaction_id: impl Into<String>) -> Self {
        Self {
            ok: true,
            transaction_id: Some(transaction_id.into()),
            already_claimed: Some(false),
            error: None,
        }
    }

    #[must_use]
    pub fn already_claimed() -> Self {
        Self {
            ok: true,
            transaction_id: None,
            already_claimed: Some(true),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            transaction_id: None,
            already_claimed: None,
            error: Some(error.into()),
        }
    }
}
