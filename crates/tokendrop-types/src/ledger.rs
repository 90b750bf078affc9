//! The ledger seam.
//!
//! TokenDrop never talks to a blockchain directly. Everything that touches
//! chain state (token account derivation, mint decimals, transaction
//! construction, signing, fee payment, confirmation) sits behind
//! [`LedgerClient`], so the disbursement logic can run against a real RPC
//! client or an in-memory ledger without change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountRef, AssetId, LedgerError, SigningCredential, TransactionId};

/// A token transfer that checks mint and decimals on-chain
/// (`transferChecked` semantics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstruction {
    /// Source token account.
    pub from: AccountRef,
    /// Destination token account.
    pub to: AccountRef,
    /// Owner of the source token account; must sign.
    pub authority: AccountRef,
    pub asset: AssetId,
    /// Amount in base units.
    pub amount: u64,
    pub decimals: u8,
}

/// One instruction of a disbursement transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerInstruction {
    /// Create the associated token account for `owner`, paid by `payer`.
    CreateAccount {
        payer: AccountRef,
        account: AccountRef,
        owner: AccountRef,
        asset: AssetId,
    },
    TransferChecked(TransferInstruction),
}

/// Result of resolving a wallet's token account for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountResolution {
    /// The derived token account address.
    pub account: AccountRef,
    /// Present when the account does not exist yet and must be created
    /// in the same transaction.
    pub creation: Option<LedgerInstruction>,
}

impl AccountResolution {
    #[must_use]
    pub fn exists(&self) -> bool {
        self.creation.is_none()
    }
}

/// Ledger view of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    /// Not yet confirmed; poll again.
    Pending,
    /// Confirmed at the client's commitment level.
    Confirmed,
    /// Landed but failed, or was dropped.
    Failed { reason: String },
}

/// A native-currency transfer observed inside a ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTransfer {
    pub from: AccountRef,
    pub to: AccountRef,
    /// Amount in native base units (lamports).
    pub amount: u64,
}

/// A confirmed transaction fetched by reference, reduced to what payment
/// verification needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedPayment {
    pub reference: String,
    pub transfers: Vec<NativeTransfer>,
    /// Block time; `None` when the ledger does not report one.
    pub block_time: Option<DateTime<Utc>>,
    /// Whether the transaction executed successfully.
    pub succeeded: bool,
}

/// Capability to read and move value on the ledger.
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Derive `owner`'s token account for `asset`, and the instruction to
    /// create it (paid by `payer`) if it does not exist yet.
    async fn resolve_or_create_account(
        &self,
        owner: &AccountRef,
        asset: &AssetId,
        payer: &AccountRef,
    ) -> Result<AccountResolution, LedgerError>;

    /// Live decimals of the asset's mint.
    async fn asset_decimals(&self, asset: &AssetId) -> Result<u8, LedgerError>;

    /// Token balance (base units) held by a token account; 0 if absent.
    async fn token_balance(&self, account: &AccountRef) -> Result<u64, LedgerError>;

    /// Construct a checked transfer. Pure; no ledger round trip.
    fn build_transfer(
        &self,
        from: &AccountRef,
        to: &AccountRef,
        authority: &AccountRef,
        asset: &AssetId,
        amount: u64,
        decimals: u8,
    ) -> TransferInstruction {
        TransferInstruction {
            from: from.clone(),
            to: to.clone(),
            authority: authority.clone(),
            asset: asset.clone(),
            amount,
            decimals,
        }
    }

    /// Sign with `signer` and broadcast. Once this returns `Ok` the
    /// transaction cannot be withdrawn.
    async fn submit(
        &self,
        instructions: &[LedgerInstruction],
        signer: &SigningCredential,
    ) -> Result<TransactionId, LedgerError>;

    /// Current confirmation status of a submitted transaction.
    async fn confirm(&self, transaction: &TransactionId) -> Result<ConfirmationStatus, LedgerError>;

    /// Look up a confirmed transaction by reference. `Ok(None)` if unknown.
    async fn fetch_payment(&self, reference: &str) -> Result<Option<ObservedPayment>, LedgerError>;
}
