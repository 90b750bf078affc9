//! # tokendrop-verify
//!
//! Authorization verifiers for TokenDrop.
//!
//! A deployment runs exactly one [`AuthorizationVerifier`], selected by
//! [`VerifierMode`]. Verification is mandatory and side-effect free: it
//! never touches the claim store and only reads from the ledger.
//!
//! - [`SignedMessageVerifier`]: ed25519 signature over
//!   `<tag>:<identity>:<timestamp>`
//! - [`ExternalPaymentVerifier`]: a confirmed payment to the treasury

pub mod external_payment;
pub mod signed_message;

pub use external_payment::ExternalPaymentVerifier;
pub use signed_message::{ClaimMessage, SignedMessageVerifier, render_claim_message};

use chrono::{DateTime, Utc};
use tokendrop_types::{
    AccountRef, ConfigError, DisbursementRequest, LedgerClient, Proof, ServiceConfig, VerificationError,
    VerificationMethod, VerifiedClaim, VerifierMode,
};

/// The configured authorization check.
#[derive(Debug, Clone)]
pub enum AuthorizationVerifier {
    SignedMessage(SignedMessageVerifier),
    ExternalPayment(ExternalPaymentVerifier),
}

impl AuthorizationVerifier {
    /// Build the verifier selected by `VERIFIER_MODE`.
    ///
    /// `treasury` is the payment destination in external-payment mode.
    pub fn from_config(config: &ServiceConfig, treasury: AccountRef) -> Result<Self, ConfigError> {
        Ok(match config.verifier_mode {
            VerifierMode::SignedMessage => Self::SignedMessage(SignedMessageVerifier::new(
                config.program_tag.trim(),
                config.message_freshness(),
            )),
            VerifierMode::ExternalPayment => Self::ExternalPayment(ExternalPaymentVerifier::new(
                treasury,
                config.min_payment_lamports()?,
                config.payment_staleness(),
            )),
        })
    }

    #[must_use]
    pub fn mode(&self) -> VerifierMode {
        match self {
            Self::SignedMessage(_) => VerifierMode::SignedMessage,
            Self::ExternalPayment(_) => VerifierMode::ExternalPayment,
        }
    }

    /// Check `request`'s proof against the configured policy.
    ///
    /// A missing proof, or a proof of the other mode's kind, is `BadFormat`.
    pub async fn verify(
        &self,
        request: &DisbursementRequest,
        ledger: &dyn LedgerClient,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaim, VerificationError> {
        let Some(proof) = request.proof.as_ref() else {
            return Err(VerificationError::bad_format("missing proof"));
        };

        let method = match (self, proof) {
            (
                Self::SignedMessage(verifier),
                Proof::SignedMessage {
                    message,
                    signature_base64,
                },
            ) => {
                let issued_at = verifier.verify(&request.identity, message, signature_base64, now)?;
                VerificationMethod::SignedMessage { issued_at }
            }
            (
                Self::ExternalPayment(verifier),
                Proof::ExternalPayment {
                    external_transaction_reference,
                },
            ) => {
                let paid = verifier
                    .verify(&request.identity, external_transaction_reference, ledger, now)
                    .await?;
                VerificationMethod::ExternalPayment {
                    reference: external_transaction_reference.trim().to_string(),
                    paid,
                }
            }
            (verifier, proof) => {
                return Err(VerificationError::bad_format(format!(
                    "{} proof given, {} expected",
                    proof.kind(),
                    verifier.mode_name()
                )));
            }
        };

        tracing::debug!(identity = %request.identity.short(), mode = self.mode_name(), "Claim authorized");

        Ok(VerifiedClaim {
            identity: request.identity.clone(),
            method,
            verified_at: now,
        })
    }

    fn mode_name(&self) -> &'static str {
        match self {
            Self::SignedMessage(_) => "signed_message",
            Self::ExternalPayment(_) => "external_payment",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokendrop_types::fixtures::{TestClaimant, test_credential};
    use tokendrop_types::{
        AccountResolution, AssetId, ConfirmationStatus, LedgerError, LedgerInstruction, ObservedPayment,
        SigningCredential, TransactionId,
    };

    use super::*;

    struct NoLedger;

    #[async_trait::async_trait]
    impl LedgerClient for NoLedger {
        async fn resolve_or_create_account(
            &self,
            _owner: &AccountRef,
            _asset: &AssetId,
            _payer: &AccountRef,
        ) -> Result<AccountResolution, LedgerError> {
            Err(LedgerError::resolution("offline"))
        }

        async fn asset_decimals(&self, _asset: &AssetId) -> Result<u8, LedgerError> {
            Err(LedgerError::QueryFailed { reason: "offline".into() })
        }

        async fn token_balance(&self, _account: &AccountRef) -> Result<u64, LedgerError> {
            Ok(0)
        }

        async fn submit(
            &self,
            _instructions: &[LedgerInstruction],
            _signer: &SigningCredential,
        ) -> Result<TransactionId, LedgerError> {
            Err(LedgerError::submission("offline"))
        }

        async fn confirm(&self, _tx: &TransactionId) -> Result<ConfirmationStatus, LedgerError> {
            Ok(ConfirmationStatus::Pending)
        }

        async fn fetch_payment(&self, _reference: &str) -> Result<Option<ObservedPayment>, LedgerError> {
            Ok(None)
        }
    }

    fn signed_mode() -> AuthorizationVerifier {
        AuthorizationVerifier::SignedMessage(SignedMessageVerifier::new("CBS_AIRDROP", Duration::from_secs(600)))
    }

    #[tokio::test]
    async fn signed_mode_accepts_fixture_request() {
        let claimant = TestClaimant::generate();
        let now = Utc::now();
        let request = claimant.signed_request("CBS_AIRDROP", now.timestamp());
        let verified = signed_mode().verify(&request, &NoLedger, now).await.unwrap();
        assert_eq!(verified.identity, claimant.identity());
        assert_eq!(
            verified.method,
            VerificationMethod::SignedMessage {
                issued_at: now.timestamp()
            }
        );
    }

    #[tokio::test]
    async fn missing_proof_is_bad_format() {
        let claimant = TestClaimant::generate();
        let request = DisbursementRequest::new(claimant.identity(), None);
        let err = signed_mode().verify(&request, &NoLedger, Utc::now()).await.unwrap_err();
        assert_eq!(err.reason_code(), "BadFormat");
    }

    #[tokio::test]
    async fn wrong_proof_kind_is_bad_format() {
        let claimant = TestClaimant::generate();
        let request = claimant.payment_request("5sig");
        let err = signed_mode().verify(&request, &NoLedger, Utc::now()).await.unwrap_err();
        assert_eq!(err.reason_code(), "BadFormat");

        let payment_mode = AuthorizationVerifier::ExternalPayment(ExternalPaymentVerifier::new(
            test_credential().address(),
            1,
            Duration::from_secs(1800),
        ));
        let request = claimant.signed_request("CBS_AIRDROP", Utc::now().timestamp());
        let err = payment_mode.verify(&request, &NoLedger, Utc::now()).await.unwrap_err();
        assert_eq!(err.reason_code(), "BadFormat");
    }

    #[test]
    fn from_config_selects_mode() {
        let treasury = test_credential().address();
        let mut config = ServiceConfig::default();
        let verifier = AuthorizationVerifier::from_config(&config, treasury.clone()).unwrap();
        assert_eq!(verifier.mode(), VerifierMode::SignedMessage);

        config.verifier_mode = VerifierMode::ExternalPayment;
        assert!(AuthorizationVerifier::from_config(&config, treasury.clone()).is_err());

        config.min_payment_amount = Some(rust_decimal::Decimal::new(1, 1));
        let verifier = AuthorizationVerifier::from_config(&config, treasury).unwrap();
        assert_eq!(verifier.mode(), VerifierMode::ExternalPayment);
    }
}
