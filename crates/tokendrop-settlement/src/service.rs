//! The disbursement pipeline.
//!
//! One request moves through:
//! 1. Verify the proof (failure → `Rejected`, nothing written)
//! 2. Acquire the claim lock (held elsewhere → `LockConflict`, not an error)
//! 3. Resolve accounts, read live decimals, build and submit a checked
//!    transfer, wait for confirmation, all under one timeout
//! 4. Finalize the claim record
//!
//! Any ledger failure in step 3, timeout included, releases the lock so
//! the claimant can retry. A transaction that was already broadcast cannot
//! be withdrawn; releasing after a timeout accepts that risk.
//!
//! The transfer deadline is kept inside the lock TTL, so the lock cannot
//! lapse while a transfer is still in flight. Once a transfer is confirmed
//! the FINALIZED write is retried with backoff and, failing that, replaced
//! by a permanent marker; a paid claim must never fall back to an expiring
//! lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokendrop_types::{
    AccountCreationPayer, AccountRef, AssetConfig, ClaimError, ClaimIdentity, ClaimRecord, ConfigError,
    ConfirmationStatus, DisbursementOutcome, DisbursementReceipt, DisbursementRequest, DisbursementStage,
    LedgerClient, LedgerError, LedgerInstruction, Result, ServiceConfig, SigningCredential, TransactionId,
    VerifierMode, amount, constants,
};
use tokendrop_verify::AuthorizationVerifier;

use crate::claim_lock::{AcquireOutcome, ClaimLock};
use crate::claim_store::ClaimStore;

/// Tracks and logs a request's stage.
struct Progress<'a> {
    identity: &'a ClaimIdentity,
    stage: DisbursementStage,
}

impl<'a> Progress<'a> {
    fn new(identity: &'a ClaimIdentity) -> Self {
        Self {
            identity,
            stage: DisbursementStage::Received,
        }
    }

    fn advance(&mut self, next: DisbursementStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal stage transition {} -> {next}",
            self.stage
        );
        tracing::debug!(identity = %self.identity.short(), from = %self.stage, to = %next, "Disbursement stage");
        self.stage = next;
    }
}

/// Orchestrates verification, claim locking and the ledger transfer.
///
/// Built once at startup and shared read-only between request tasks.
pub struct DisbursementService {
    verifier: AuthorizationVerifier,
    claims: ClaimLock,
    ledger: Arc<dyn LedgerClient>,
    credential: SigningCredential,
    treasury: AccountRef,
    asset: AssetConfig,
    creation_payer: AccountCreationPayer,
    transfer_timeout: Duration,
    confirm_poll_interval: Duration,
}

impl DisbursementService {
    pub fn new(
        verifier: AuthorizationVerifier,
        claims: ClaimLock,
        ledger: Arc<dyn LedgerClient>,
        credential: SigningCredential,
        treasury: AccountRef,
        asset: AssetConfig,
    ) -> Self {
        Self {
            verifier,
            claims,
            ledger,
            credential,
            treasury,
            asset,
            creation_payer: AccountCreationPayer::default(),
            transfer_timeout: Duration::from_secs(constants::DEFAULT_TRANSFER_TIMEOUT_SECS),
            confirm_poll_interval: Duration::from_millis(constants::DEFAULT_CONFIRM_POLL_INTERVAL_MS),
        }
    }

    /// Wire a service from validated configuration.
    pub fn from_config(
        config: &ServiceConfig,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn ClaimStore>,
    ) -> std::result::Result<Self, ConfigError> {
        let credential = config.signing_credential()?;
        let treasury = config.treasury_address(&credential)?;
        let asset = config.asset_config()?;
        let verifier = AuthorizationVerifier::from_config(config, treasury.clone())?;
        let claims = ClaimLock::new(store, config.claim_lock_ttl(), config.claim_cooldown());

        Ok(Self::new(verifier, claims, ledger, credential, treasury, asset)
            .with_creation_payer(config.account_creation_payer)
            .with_transfer_timeout(config.transfer_timeout()))
    }

    #[must_use]
    pub fn with_creation_payer(mut self, payer: AccountCreationPayer) -> Self {
        self.creation_payer = payer;
        self
    }

    #[must_use]
    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_confirm_poll_interval(mut self, interval: Duration) -> Self {
        self.confirm_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn claim_lock(&self) -> &ClaimLock {
        &self.claims
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    #[must_use]
    pub fn treasury(&self) -> &AccountRef {
        &self.treasury
    }

    #[must_use]
    pub fn asset(&self) -> &AssetConfig {
        &self.asset
    }

    #[must_use]
    pub fn verifier_mode(&self) -> VerifierMode {
        self.verifier.mode()
    }

    /// Upper bound on the transfer phase: the configured timeout, clamped
    /// to leave part of the lock TTL for the finalize write.
    #[must_use]
    pub fn transfer_deadline(&self) -> Duration {
        let ttl = self.claims.lock_ttl();
        let margin = (ttl / 4).min(Duration::from_secs(constants::CLAIM_LOCK_TTL_MARGIN_SECS));
        self.transfer_timeout.min(ttl.saturating_sub(margin))
    }

    /// Handle one request against the current wall clock.
    pub async fn disburse(&self, request: DisbursementRequest) -> Result<DisbursementOutcome> {
        self.disburse_at(request, Utc::now()).await
    }

    /// Handle one request as of `now`.
    pub async fn disburse_at(
        &self,
        request: DisbursementRequest,
        now: DateTime<Utc>,
    ) -> Result<DisbursementOutcome> {
        let identity = &request.identity;
        let mut progress = Progress::new(identity);

        progress.advance(DisbursementStage::Verifying);
        if let Err(e) = self.verifier.verify(&request, self.ledger.as_ref(), now).await {
            progress.advance(DisbursementStage::Rejected);
            tracing::info!(identity = %identity.short(), reason = e.reason_code(), "Claim rejected");
            return Err(e.into());
        }

        progress.advance(DisbursementStage::Locking);
        let held = match self.claims.acquire(identity, now).await {
            Ok(AcquireOutcome::Acquired(held)) => held,
            Ok(AcquireOutcome::AlreadyClaimed(existing)) => {
                progress.advance(DisbursementStage::LockConflict);
                tracing::info!(
                    identity = %identity.short(),
                    state = ?existing.as_ref().map(|r| r.state),
                    "Identity already claimed"
                );
                return Ok(DisbursementOutcome::AlreadyClaimed { existing });
            }
            Err(e) => {
                progress.advance(DisbursementStage::Failed);
                tracing::error!(identity = %identity.short(), error = %e, "Claim lock unavailable");
                return Err(e.into());
            }
        };

        progress.advance(DisbursementStage::Transferring);
        let deadline = self.transfer_deadline();
        let transfer = match tokio::time::timeout(deadline, self.transfer(identity)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::ConfirmationTimeout {
                after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match transfer {
            Ok(receipt) => {
                self.record_payout(&held, &receipt).await;
                progress.advance(DisbursementStage::Finalized);
                tracing::info!(
                    identity = %identity.short(),
                    tx = %receipt.transaction_id,
                    amount = receipt.amount,
                    decimals = receipt.decimals,
                    created_destination = receipt.created_destination,
                    "Disbursement finalized"
                );
                Ok(DisbursementOutcome::Disbursed(receipt))
            }
            Err(e) => {
                progress.advance(DisbursementStage::Failed);
                if let Err(release_err) = self.claims.release(&held).await {
                    tracing::error!(
                        identity = %identity.short(),
                        error = %release_err,
                        "Failed to release claim lock after transfer failure"
                    );
                }
                tracing::error!(identity = %identity.short(), error = %e, "Disbursement failed");
                Err(e.into())
            }
        }
    }

    /// Persist the paid claim. Never fails the request: the tokens have
    /// already moved, so every failure here is logged for reconciliation.
    async fn record_payout(&self, held: &ClaimRecord, receipt: &DisbursementReceipt) {
        let identity = held.identity.short();
        let tx = &receipt.transaction_id;

        let finalized = Self::with_backoff("Finalize", identity, || {
            self.claims.finalize(held, tx.clone(), receipt.finalized_at)
        })
        .await;
        match finalized {
            Ok(()) => return,
            Err(ClaimError::InvalidTransition { .. }) => {
                tracing::error!(
                    identity = %identity,
                    tx = %tx,
                    "Claim was already paid by another transfer; manual reconciliation needed"
                );
                return;
            }
            Err(_) => {}
        }

        let recorded = Self::with_backoff("Permanent claim record", identity, || {
            self.claims.record_permanent(held, tx.clone(), receipt.finalized_at)
        })
        .await;
        match recorded {
            Ok(()) => {
                tracing::warn!(identity = %identity, tx = %tx, "Claim recorded as permanently paid");
            }
            Err(e) => {
                tracing::error!(
                    identity = %identity,
                    tx = %tx,
                    error = %e,
                    "Transfer confirmed but claim could not be recorded; manual reconciliation needed"
                );
            }
        }
    }

    /// Run `op` up to [`constants::FINALIZE_ATTEMPTS`] times, doubling the
    /// pause between attempts. An invalid transition is final and not retried.
    async fn with_backoff<F, Fut>(what: &str, identity: &str, mut op: F) -> std::result::Result<(), ClaimError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<ClaimRecord, ClaimError>>,
    {
        let mut backoff = Duration::from_millis(constants::FINALIZE_BACKOFF_MS);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(_) => return Ok(()),
                Err(e @ ClaimError::InvalidTransition { .. }) => return Err(e),
                Err(e) if attempt >= constants::FINALIZE_ATTEMPTS => return Err(e),
                Err(e) => {
                    tracing::warn!(identity = %identity, attempt, error = %e, "{what} failed; retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }

    async fn transfer(&self, recipient: &ClaimIdentity) -> std::result::Result<DisbursementReceipt, LedgerError> {
        let asset = &self.asset.asset_id;

        let decimals = self.ledger.asset_decimals(asset).await?;
        if let Some(declared) = self.asset.declared_decimals {
            if declared != decimals {
                tracing::warn!(
                    asset = %asset,
                    declared,
                    live = decimals,
                    "Configured ASSET_DECIMALS differs from mint; using live value"
                );
            }
        }
        let base_units = amount::to_base_units(self.asset.unit_amount, decimals)?;

        let signer = self.credential.address();
        let source = self
            .ledger
            .resolve_or_create_account(&self.treasury, asset, &signer)
            .await?;
        if !source.exists() {
            return Err(LedgerError::resolution(format!(
                "treasury {} has no token account for {asset}",
                self.treasury
            )));
        }
        let available = self.ledger.token_balance(&source.account).await?;
        if available < base_units {
            return Err(LedgerError::InsufficientTreasuryFunds {
                needed: base_units,
                available,
            });
        }

        let owner = recipient.as_account();
        let payer = match self.creation_payer {
            AccountCreationPayer::Treasury => signer,
            AccountCreationPayer::Recipient => owner.clone(),
        };
        let destination = self.ledger.resolve_or_create_account(&owner, asset, &payer).await?;
        let created_destination = !destination.exists();

        let mut instructions = Vec::with_capacity(2);
        if let Some(create) = destination.creation {
            instructions.push(create);
        }
        instructions.push(LedgerInstruction::TransferChecked(self.ledger.build_transfer(
            &source.account,
            &destination.account,
            &self.treasury,
            asset,
            base_units,
            decimals,
        )));

        let transaction_id = self.ledger.submit(&instructions, &self.credential).await?;
        tracing::debug!(tx = %transaction_id, "Disbursement submitted");
        self.await_confirmation(&transaction_id).await?;

        Ok(DisbursementReceipt {
            identity: recipient.clone(),
            transaction_id,
            asset: asset.clone(),
            destination: destination.account,
            amount: base_units,
            decimals,
            created_destination,
            finalized_at: Utc::now(),
        })
    }

    /// Poll until confirmed or failed. Bounded by the caller's timeout.
    async fn await_confirmation(&self, transaction: &TransactionId) -> std::result::Result<(), LedgerError> {
        loop {
            match self.ledger.confirm(transaction).await? {
                ConfirmationStatus::Confirmed => return Ok(()),
                ConfirmationStatus::Failed { reason } => {
                    return Err(LedgerError::SubmissionFailed { reason });
                }
                ConfirmationStatus::Pending => tokio::time::sleep(self.confirm_poll_interval).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tokendrop_types::fixtures::{TestClaimant, test_credential};
    use tokendrop_types::{AssetId, TokendropError, VerificationError};
    use tokendrop_verify::SignedMessageVerifier;

    use super::*;
    use crate::memory_ledger::InMemoryLedger;
    use crate::memory_store::MemoryClaimStore;

    const TAG: &str = "CBS_AIRDROP";
    const CBS_MINT: &str = "B9z8cEWFmc7LvQtjKsaLoKqW5MJmGRCWqs1DPKupCfkk";

    struct Harness {
        ledger: Arc<InMemoryLedger>,
        service: DisbursementService,
        treasury: AccountRef,
        asset: AssetId,
    }

    fn harness(declared_decimals: Option<u8>, live_decimals: u8, treasury_funds: u64) -> Harness {
        let asset = AssetId::parse(CBS_MINT).unwrap();
        let credential = test_credential();
        let treasury = credential.address();
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.add_asset(&asset, live_decimals);
        ledger.fund(&treasury, &asset, treasury_funds);

        let service = DisbursementService::new(
            AuthorizationVerifier::SignedMessage(SignedMessageVerifier::new(TAG, Duration::from_secs(600))),
            ClaimLock::new(Arc::new(MemoryClaimStore::new()), Duration::from_secs(120), None),
            ledger.clone(),
            credential,
            treasury.clone(),
            AssetConfig {
                asset_id: asset.clone(),
                unit_amount: Decimal::from(250),
                declared_decimals,
            },
        )
        .with_confirm_poll_interval(Duration::from_millis(5));

        Harness {
            ledger,
            service,
            treasury,
            asset,
        }
    }

    #[tokio::test]
    async fn disburses_live_decimal_amount() {
        let h = harness(Some(9), 9, 1_000_000_000_000);
        let claimant = TestClaimant::generate();
        let outcome = h
            .service
            .disburse(claimant.signed_request(TAG, Utc::now().timestamp()))
            .await
            .unwrap();

        let DisbursementOutcome::Disbursed(receipt) = outcome else {
            panic!("expected a disbursement");
        };
        assert_eq!(receipt.amount, 250_000_000_000);
        assert!(receipt.created_destination);
        assert_eq!(
            h.ledger.balance_of(&claimant.identity().as_account(), &h.asset),
            250_000_000_000
        );
        let record = h.service.claim_lock().status(&claimant.identity()).await.unwrap().unwrap();
        assert_eq!(record.transaction_id, Some(receipt.transaction_id));
    }

    #[tokio::test]
    async fn live_decimals_override_declared() {
        let h = harness(Some(9), 5, 100_000_000);
        let claimant = TestClaimant::generate();
        let outcome = h
            .service
            .disburse(claimant.signed_request(TAG, Utc::now().timestamp()))
            .await
            .unwrap();
        let DisbursementOutcome::Disbursed(receipt) = outcome else {
            panic!("expected a disbursement");
        };
        assert_eq!(receipt.decimals, 5);
        assert_eq!(receipt.amount, 25_000_000);
    }

    #[tokio::test]
    async fn rejected_request_writes_nothing() {
        let h = harness(None, 9, 1_000_000_000_000);
        let claimant = TestClaimant::generate();
        let stale = claimant.signed_request(TAG, Utc::now().timestamp() - 3600);
        let err = h.service.disburse(stale).await.unwrap_err();
        assert_eq!(err, TokendropError::Verification(VerificationError::MessageExpired));
        assert!(h.service.claim_lock().status(&claimant.identity()).await.unwrap().is_none());
        assert_eq!(h.ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn insufficient_treasury_releases_lock() {
        let h = harness(None, 9, 10);
        let claimant = TestClaimant::generate();
        let err = h
            .service
            .disburse(claimant.signed_request(TAG, Utc::now().timestamp()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TokendropError::Ledger(LedgerError::InsufficientTreasuryFunds { .. })
        ));
        assert!(h.service.claim_lock().status(&claimant.identity()).await.unwrap().is_none());
        assert_eq!(h.ledger.balance_of(&h.treasury, &h.asset), 10);
    }

    #[tokio::test]
    async fn amount_overflow_is_ledger_error() {
        let h = harness(None, 19, u64::MAX);
        let claimant = TestClaimant::generate();
        let err = h
            .service
            .disburse(claimant.signed_request(TAG, Utc::now().timestamp()))
            .await
            .unwrap_err();
        assert!(matches!(err, TokendropError::Ledger(LedgerError::AmountOverflow { .. })));
        assert!(h.service.claim_lock().status(&claimant.identity()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recipient_can_pay_for_account_creation() {
        let mut h = harness(None, 9, 1_000_000_000_000);
        h.service = h.service.with_creation_payer(AccountCreationPayer::Recipient);
        let claimant = TestClaimant::generate();
        let outcome = h
            .service
            .disburse(claimant.signed_request(TAG, Utc::now().timestamp()))
            .await
            .unwrap();
        assert!(!outcome.is_already_claimed());
        assert!(h.ledger.account_exists(&claimant.identity().as_account(), &h.asset));
    }

    #[test]
    fn transfer_deadline_stays_inside_lock_ttl() {
        let h = harness(None, 9, 0);
        assert_eq!(h.service.transfer_deadline(), Duration::from_secs(60));
        let service = h.service.with_transfer_timeout(Duration::from_secs(300));
        assert_eq!(service.transfer_deadline(), Duration::from_secs(110));
    }

    #[test]
    fn progress_follows_stage_graph() {
        let identity = TestClaimant::generate().identity();
        let mut progress = Progress::new(&identity);
        for stage in [
            DisbursementStage::Verifying,
            DisbursementStage::Locking,
            DisbursementStage::Transferring,
            DisbursementStage::Finalized,
        ] {
            progress.advance(stage);
        }
        assert!(progress.stage.is_terminal());
    }
}
