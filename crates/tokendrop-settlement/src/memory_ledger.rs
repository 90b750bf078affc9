//! In-process ledger.
//!
//! Models just enough of an SPL-style token ledger to run the disbursement
//! pipeline without a network: mints with decimals, derived token
//! accounts, checked transfers applied atomically per transaction, native
//! payments for payment verification, and confirmation status.
//!
//! Used by tests and by `LEDGER_ENDPOINT=memory` for local development.
//! Failure injection hooks let tests drive the rollback paths.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokendrop_types::{
    AccountRef, AccountResolution, AssetId, ConfirmationStatus, LedgerClient, LedgerError, LedgerInstruction,
    ObservedPayment, SigningCredential, TransactionId, TransferInstruction,
};

/// How submitted transactions resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationMode {
    /// Applied and confirmed on submission.
    #[default]
    Immediate,
    /// Accepted but stays pending forever; balances do not move.
    NeverConfirms,
    /// Accepted, then reported as failed; balances do not move.
    Fails,
}

#[derive(Debug, Clone)]
struct TokenAccount {
    owner: AccountRef,
    asset: AssetId,
    balance: u64,
}

#[derive(Default)]
struct LedgerState {
    mints: HashMap<AssetId, u8>,
    accounts: HashMap<AccountRef, TokenAccount>,
    payments: HashMap<String, ObservedPayment>,
    transactions: HashMap<TransactionId, ConfirmationStatus>,
    submissions: u64,
    fail_next_submit: Option<String>,
    confirmation: ConfirmationMode,
    submit_delay: Option<Duration>,
}

/// Deterministic token account address for `(owner, asset)`.
#[must_use]
pub fn derive_token_account(owner: &AccountRef, asset: &AssetId) -> AccountRef {
    let mut hasher = Sha256::new();
    hasher.update(b"tokendrop:token-account:");
    hasher.update(owner.to_bytes());
    hasher.update(asset.to_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    AccountRef::from_bytes(&digest)
}

/// Simulated ledger implementing [`LedgerClient`].
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state.lock().map_err(|_| LedgerError::QueryFailed {
            reason: "in-memory ledger lock poisoned".into(),
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LedgerState) -> T) -> T {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Register a mint.
    pub fn add_asset(&self, asset: &AssetId, decimals: u8) {
        self.with_state(|s| {
            s.mints.insert(asset.clone(), decimals);
        });
    }

    /// Credit `amount` base units to `owner`'s token account, creating it.
    pub fn fund(&self, owner: &AccountRef, asset: &AssetId, amount: u64) -> AccountRef {
        let address = derive_token_account(owner, asset);
        self.with_state(|s| {
            let account = s.accounts.entry(address.clone()).or_insert_with(|| TokenAccount {
                owner: owner.clone(),
                asset: asset.clone(),
                balance: 0,
            });
            account.balance = account.balance.saturating_add(amount);
        });
        address
    }

    /// Make a payment visible to [`LedgerClient::fetch_payment`].
    pub fn record_payment(&self, payment: ObservedPayment) {
        self.with_state(|s| {
            s.payments.insert(payment.reference.clone(), payment);
        });
    }

    /// The next `submit` fails with `SubmissionFailed(reason)`.
    pub fn fail_next_submit(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.with_state(|s| s.fail_next_submit = Some(reason));
    }

    pub fn set_confirmation_mode(&self, mode: ConfirmationMode) {
        self.with_state(|s| s.confirmation = mode);
    }

    /// Delay every `submit` by `delay` before it is processed.
    pub fn set_submit_delay(&self, delay: Option<Duration>) {
        self.with_state(|s| s.submit_delay = delay);
    }

    /// Number of `submit` calls seen, failed ones included.
    #[must_use]
    pub fn submission_count(&self) -> u64 {
        self.with_state(|s| s.submissions)
    }

    /// Token balance of `owner` for `asset`; 0 if the account does not exist.
    #[must_use]
    pub fn balance_of(&self, owner: &AccountRef, asset: &AssetId) -> u64 {
        let address = derive_token_account(owner, asset);
        self.with_state(|s| s.accounts.get(&address).map_or(0, |a| a.balance))
    }

    #[must_use]
    pub fn account_exists(&self, owner: &AccountRef, asset: &AssetId) -> bool {
        let address = derive_token_account(owner, asset);
        self.with_state(|s| s.accounts.contains_key(&address))
    }
}

/// Apply `instructions` to a copy of the account table; commit only if all succeed.
fn execute(
    state: &LedgerState,
    instructions: &[LedgerInstruction],
    signer: &AccountRef,
) -> Result<HashMap<AccountRef, TokenAccount>, LedgerError> {
    let mut accounts = state.accounts.clone();
    for instruction in instructions {
        match instruction {
            LedgerInstruction::CreateAccount {
                account,
                owner,
                asset,
                ..
            } => {
                if !state.mints.contains_key(asset) {
                    return Err(LedgerError::submission(format!("unknown mint {asset}")));
                }
                if accounts.contains_key(account) {
                    return Err(LedgerError::submission(format!("account {account} already exists")));
                }
                accounts.insert(
                    account.clone(),
                    TokenAccount {
                        owner: owner.clone(),
                        asset: asset.clone(),
                        balance: 0,
                    },
                );
            }
            LedgerInstruction::TransferChecked(transfer) => {
                apply_transfer(state, &mut accounts, transfer, signer)?;
            }
        }
    }
    Ok(accounts)
}

fn apply_transfer(
    state: &LedgerState,
    accounts: &mut HashMap<AccountRef, TokenAccount>,
    transfer: &TransferInstruction,
    signer: &AccountRef,
) -> Result<(), LedgerError> {
    let decimals = state
        .mints
        .get(&transfer.asset)
        .copied()
        .ok_or_else(|| LedgerError::submission(format!("unknown mint {}", transfer.asset)))?;
    if decimals != transfer.decimals {
        return Err(LedgerError::submission(format!(
            "decimals mismatch: mint has {decimals}, instruction says {}",
            transfer.decimals
        )));
    }
    if &transfer.authority != signer {
        return Err(LedgerError::submission("transfer authority did not sign"));
    }

    let source = accounts
        .get(&transfer.from)
        .ok_or_else(|| LedgerError::submission("source account missing"))?;
    if source.owner != transfer.authority || source.asset != transfer.asset {
        return Err(LedgerError::submission("source account owner or mint mismatch"));
    }
    if source.balance < transfer.amount {
        return Err(LedgerError::InsufficientTreasuryFunds {
            needed: transfer.amount,
            available: source.balance,
        });
    }
    match accounts.get(&transfer.to) {
        Some(dest) if dest.asset == transfer.asset => {}
        Some(_) => return Err(LedgerError::submission("destination mint mismatch")),
        None => return Err(LedgerError::submission("destination account missing")),
    }

    if let Some(source) = accounts.get_mut(&transfer.from) {
        source.balance -= transfer.amount;
    }
    if let Some(dest) = accounts.get_mut(&transfer.to) {
        dest.balance = dest.balance.saturating_add(transfer.amount);
    }
    Ok(())
}

fn transaction_id(
    instructions: &[LedgerInstruction],
    nonce: u64,
    signer: &SigningCredential,
) -> Result<TransactionId, LedgerError> {
    let body = serde_json::to_vec(instructions).map_err(LedgerError::submission)?;
    let mut hasher = Sha256::new();
    hasher.update(&body);
    hasher.update(nonce.to_le_bytes());
    let signature = signer.sign(&hasher.finalize());
    Ok(TransactionId::new(bs58::encode(signature.to_bytes()).into_string()))
}

#[async_trait::async_trait]
impl LedgerClient for InMemoryLedger {
    async fn resolve_or_create_account(
        &self,
        owner: &AccountRef,
        asset: &AssetId,
        payer: &AccountRef,
    ) -> Result<AccountResolution, LedgerError> {
        let state = self.state()?;
        if !state.mints.contains_key(asset) {
            return Err(LedgerError::resolution(format!("unknown mint {asset}")));
        }
        let account = derive_token_account(owner, asset);
        let creation = (!state.accounts.contains_key(&account)).then(|| LedgerInstruction::CreateAccount {
            payer: payer.clone(),
            account: account.clone(),
            owner: owner.clone(),
            asset: asset.clone(),
        });
        Ok(AccountResolution { account, creation })
    }

    async fn asset_decimals(&self, asset: &AssetId) -> Result<u8, LedgerError> {
        self.state()?
            .mints
            .get(asset)
            .copied()
            .ok_or_else(|| LedgerError::QueryFailed {
                reason: format!("unknown mint {asset}"),
            })
    }

    async fn token_balance(&self, account: &AccountRef) -> Result<u64, LedgerError> {
        Ok(self.state()?.accounts.get(account).map_or(0, |a| a.balance))
    }

    async fn submit(
        &self,
        instructions: &[LedgerInstruction],
        signer: &SigningCredential,
    ) -> Result<TransactionId, LedgerError> {
        let delay = {
            let mut state = self.state()?;
            state.submissions += 1;
            state.submit_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state()?;
        if let Some(reason) = state.fail_next_submit.take() {
            return Err(LedgerError::SubmissionFailed { reason });
        }

        let accounts = execute(&state, instructions, &signer.address())?;
        let id = transaction_id(instructions, state.submissions, signer)?;
        let status = match state.confirmation {
            ConfirmationMode::Immediate => {
                state.accounts = accounts;
                ConfirmationStatus::Confirmed
            }
            ConfirmationMode::NeverConfirms => ConfirmationStatus::Pending,
            ConfirmationMode::Fails => ConfirmationStatus::Failed {
                reason: "simulated on-chain failure".into(),
            },
        };
        state.transactions.insert(id.clone(), status);
        Ok(id)
    }

    async fn confirm(&self, transaction: &TransactionId) -> Result<ConfirmationStatus, LedgerError> {
        Ok(self
            .state()?
            .transactions
            .get(transaction)
            .cloned()
            .unwrap_or(ConfirmationStatus::Failed {
                reason: "transaction not found".into(),
            }))
    }

    async fn fetch_payment(&self, reference: &str) -> Result<Option<ObservedPayment>, LedgerError> {
        Ok(self.state()?.payments.get(reference).cloned())
    }
}

#[cfg(test)]
mod tests {
    use tokendrop_types::fixtures::{TestClaimant, test_credential};

    use super::*;

    const CBS_MINT: &str = "B9z8cEWFmc7LvQtjKsaLoKqW5MJmGRCWqs1DPKupCfkk";

    fn asset() -> AssetId {
        AssetId::parse(CBS_MINT).unwrap()
    }

    fn transfer(
        ledger: &InMemoryLedger,
        from_owner: &AccountRef,
        to: &AccountRef,
        amount: u64,
        decimals: u8,
    ) -> TransferInstruction {
        ledger.build_transfer(
            &derive_token_account(from_owner, &asset()),
            to,
            from_owner,
            &asset(),
            amount,
            decimals,
        )
    }

    #[test]
    fn derived_accounts_are_stable_and_distinct() {
        let a = TestClaimant::generate().identity().as_account();
        let b = TestClaimant::generate().identity().as_account();
        assert_eq!(derive_token_account(&a, &asset()), derive_token_account(&a, &asset()));
        assert_ne!(derive_token_account(&a, &asset()), derive_token_account(&b, &asset()));
    }

    #[tokio::test]
    async fn create_and_transfer_in_one_transaction() {
        let ledger = InMemoryLedger::new();
        ledger.add_asset(&asset(), 9);
        let treasury = test_credential();
        ledger.fund(&treasury.address(), &asset(), 1_000);

        let recipient = TestClaimant::generate().identity().as_account();
        let resolution = ledger
            .resolve_or_create_account(&recipient, &asset(), &treasury.address())
            .await
            .unwrap();
        assert!(!resolution.exists());

        let mut ixs = vec![resolution.creation.clone().unwrap()];
        ixs.push(LedgerInstruction::TransferChecked(transfer(
            &ledger,
            &treasury.address(),
            &resolution.account,
            400,
            9,
        )));
        let tx = ledger.submit(&ixs, &treasury).await.unwrap();
        assert_eq!(ledger.confirm(&tx).await.unwrap(), ConfirmationStatus::Confirmed);
        assert_eq!(ledger.balance_of(&recipient, &asset()), 400);
        assert_eq!(ledger.balance_of(&treasury.address(), &asset()), 600);
    }

    #[tokio::test]
    async fn failed_instruction_leaves_no_partial_state() {
        let ledger = InMemoryLedger::new();
        ledger.add_asset(&asset(), 9);
        let treasury = test_credential();
        ledger.fund(&treasury.address(), &asset(), 10);

        let recipient = TestClaimant::generate().identity().as_account();
        let resolution = ledger
            .resolve_or_create_account(&recipient, &asset(), &treasury.address())
            .await
            .unwrap();
        let ixs = vec![
            resolution.creation.clone().unwrap(),
            LedgerInstruction::TransferChecked(transfer(
                &ledger,
                &treasury.address(),
                &resolution.account,
                11,
                9,
            )),
        ];
        let err = ledger.submit(&ixs, &treasury).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientTreasuryFunds {
                needed: 11,
                available: 10
            }
        );
        assert!(!ledger.account_exists(&recipient, &asset()));
    }

    #[tokio::test]
    async fn rejects_wrong_decimals_and_foreign_signer() {
        let ledger = InMemoryLedger::new();
        ledger.add_asset(&asset(), 5);
        let treasury = test_credential();
        let recipient = TestClaimant::generate().identity().as_account();
        ledger.fund(&treasury.address(), &asset(), 100);
        let dest = ledger.fund(&recipient, &asset(), 0);

        let wrong_decimals = [LedgerInstruction::TransferChecked(transfer(
            &ledger,
            &treasury.address(),
            &dest,
            1,
            9,
        ))];
        assert!(ledger.submit(&wrong_decimals, &treasury).await.is_err());

        let ok = [LedgerInstruction::TransferChecked(transfer(
            &ledger,
            &treasury.address(),
            &dest,
            1,
            5,
        ))];
        assert!(ledger.submit(&ok, &test_credential()).await.is_err());
        assert!(ledger.submit(&ok, &treasury).await.is_ok());
        assert_eq!(ledger.submission_count(), 3);
    }

    #[tokio::test]
    async fn failure_injection_is_one_shot() {
        let ledger = InMemoryLedger::new();
        ledger.add_asset(&asset(), 9);
        let treasury = test_credential();
        ledger.fail_next_submit("blockhash not found");
        assert!(matches!(
            ledger.submit(&[], &treasury).await,
            Err(LedgerError::SubmissionFailed { .. })
        ));
        assert!(ledger.submit(&[], &treasury).await.is_ok());
    }

    #[tokio::test]
    async fn confirmation_modes() {
        let ledger = InMemoryLedger::new();
        let treasury = test_credential();
        ledger.set_confirmation_mode(ConfirmationMode::NeverConfirms);
        let tx = ledger.submit(&[], &treasury).await.unwrap();
        assert_eq!(ledger.confirm(&tx).await.unwrap(), ConfirmationStatus::Pending);

        ledger.set_confirmation_mode(ConfirmationMode::Fails);
        let tx = ledger.submit(&[], &treasury).await.unwrap();
        assert!(matches!(
            ledger.confirm(&tx).await.unwrap(),
            ConfirmationStatus::Failed { .. }
        ));

        let unknown = TransactionId::new("nope");
        assert!(matches!(
            ledger.confirm(&unknown).await.unwrap(),
            ConfirmationStatus::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn unknown_mint_fails_resolution() {
        let ledger = InMemoryLedger::new();
        let owner = test_credential().address();
        assert!(matches!(
            ledger.resolve_or_create_account(&owner, &asset(), &owner).await,
            Err(LedgerError::AccountResolutionFailed { .. })
        ));
        assert!(ledger.asset_decimals(&asset()).await.is_err());
    }
}
