//! # tokendrop-settlement
//!
//! **Disbursement plane**: claim locking, claim storage, ledger hand-off
//! and rollback.
//!
//! ## Architecture
//!
//! [`DisbursementService`] receives a [`DisbursementRequest`] and:
//! 1. Verifies the caller's proof ([`tokendrop_verify`])
//! 2. Takes the per-identity claim lock ([`ClaimLock`])
//! 3. Builds, submits and confirms a checked token transfer ([`LedgerClient`])
//! 4. Finalizes the claim, or releases it on any ledger failure
//!
//! ## Claim stores
//!
//! - [`SqliteClaimStore`]: durable, atomic set-if-absent in one statement
//! - [`MemoryClaimStore`]: in-process only (degraded mode)
//!
//! [`DisbursementRequest`]: tokendrop_types::DisbursementRequest
//! [`LedgerClient`]: tokendrop_types::LedgerClient

pub mod claim_lock;
pub mod claim_store;
pub mod memory_ledger;
pub mod memory_store;
pub mod service;
pub mod sqlite_store;

pub use claim_lock::{AcquireOutcome, ClaimLock};
pub use claim_store::{ClaimStore, open_claim_store};
pub use memory_ledger::{ConfirmationMode, InMemoryLedger, derive_token_account};
pub use memory_store::MemoryClaimStore;
pub use service::DisbursementService;
pub use sqlite_store::SqliteClaimStore;
