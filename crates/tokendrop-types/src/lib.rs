//! # tokendrop-types
//!
//! Shared types, errors, and configuration for the **TokenDrop**
//! single-claim disbursement service.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`ClaimIdentity`], [`AccountRef`], [`AssetId`], [`TransactionId`]
//! - **Claim model**: [`ClaimRecord`], [`ClaimState`], [`DisbursementStage`]
//! - **Requests**: [`DisbursementRequest`], [`Proof`], [`VerifiedClaim`]
//! - **Receipts**: [`DisbursementReceipt`], [`DisbursementOutcome`]
//! - **Ledger seam**: [`LedgerClient`] and the instructions it submits
//! - **Configuration**: [`ServiceConfig`], [`AssetConfig`], [`SigningCredential`]
//! - **Amounts**: decimal to base-unit conversion in [`amount`]
//! - **Errors**: [`TokendropError`] with `TD_ERR_` prefix codes
//! - **Constants**: defaults and limits

pub mod amount;
pub mod claim;
pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod receipt;
pub mod request;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fixtures;

pub use claim::*;
pub use config::*;
pub use credential::*;
pub use error::*;
pub use ids::*;
pub use ledger::*;
pub use receipt::*;
pub use request::*;

// Constants and amount helpers are accessed by module path
// (`tokendrop_types::constants::FOO`, `tokendrop_types::amount::to_base_units`).
