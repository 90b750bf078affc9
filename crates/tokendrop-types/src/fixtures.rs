//! Test fixtures: generated claimants and credentials.
//!
//! Only compiled for tests and with the `test-helpers` feature.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use crate::{ClaimIdentity, DisbursementRequest, Proof, SigningCredential};

/// A wallet holder able to sign claim messages.
pub struct TestClaimant {
    key: SigningKey,
}

impl TestClaimant {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    #[must_use]
    pub fn identity(&self) -> ClaimIdentity {
        ClaimIdentity::from_public_key(&self.key.verifying_key().to_bytes())
    }

    /// `<tag>:<identity>:<unix_ts>`
    #[must_use]
    pub fn claim_message(&self, tag: &str, unix_ts: i64) -> String {
        format!("{tag}:{}:{unix_ts}", self.identity())
    }

    /// Base64 ed25519 signature over the UTF-8 bytes of `text`.
    #[must_use]
    pub fn sign_base64(&self, text: &str) -> String {
        STANDARD.encode(self.key.sign(text.as_bytes()).to_bytes())
    }

    #[must_use]
    pub fn signed_proof(&self, tag: &str, unix_ts: i64) -> Proof {
        let message = self.claim_message(tag, unix_ts);
        let signature_base64 = self.sign_base64(&message);
        Proof::SignedMessage {
            message,
            signature_base64,
        }
    }

    #[must_use]
    pub fn signed_request(&self, tag: &str, unix_ts: i64) -> DisbursementRequest {
        DisbursementRequest::new(self.identity(), Some(self.signed_proof(tag, unix_ts)))
    }

    #[must_use]
    pub fn payment_request(&self, reference: &str) -> DisbursementRequest {
        DisbursementRequest::new(
            self.identity(),
            Some(Proof::ExternalPayment {
                external_transaction_reference: reference.to_string(),
            }),
        )
    }
}

/// Fresh random treasury credential.
#[must_use]
pub fn test_credential() -> SigningCredential {
    SigningCredential::from_signing_key(SigningKey::generate(&mut OsRng))
}
