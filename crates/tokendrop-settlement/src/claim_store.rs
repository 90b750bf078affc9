//! Key/value storage for claim records.
//!
//! The claim lock relies on two atomic primitives: set-if-absent with an
//! optional TTL, where expired entries count as absent, and
//! compare-and-swap / compare-and-delete against the exact record a holder
//! wrote. Implementations are synchronous; the claim lock moves every call
//! onto the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use tokendrop_types::{ClaimError, ClaimRecord, ClaimStoreEndpoint};

use crate::memory_store::MemoryClaimStore;
use crate::sqlite_store::SqliteClaimStore;

/// Shared, concurrency-safe claim record storage.
pub trait ClaimStore: Send + Sync {
    /// Store `record` under `key` only if no live entry exists.
    /// Returns `true` if this call wrote the entry.
    fn try_set_if_absent(
        &self,
        key: &str,
        record: &ClaimRecord,
        ttl: Option<Duration>,
    ) -> Result<bool, ClaimError>;

    /// Unconditionally store `record` under `key`.
    fn put(&self, key: &str, record: &ClaimRecord, ttl: Option<Duration>) -> Result<(), ClaimError>;

    /// Live record under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<ClaimRecord>, ClaimError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), ClaimError>;

    /// Replace the entry under `key` with `record` only if it still holds
    /// exactly `expected`, expired or not. Returns `true` if replaced.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: &ClaimRecord,
        record: &ClaimRecord,
        ttl: Option<Duration>,
    ) -> Result<bool, ClaimError>;

    /// Remove `key` only if it still holds exactly `expected`.
    /// Returns `true` if removed.
    fn compare_and_delete(&self, key: &str, expected: &ClaimRecord) -> Result<bool, ClaimError>;

    /// Whether records survive a process restart.
    fn is_durable(&self) -> bool;

    /// Short backend name for logs and readiness output.
    fn backend_name(&self) -> &'static str;

    fn health_check(&self) -> Result<(), ClaimError> {
        Ok(())
    }
}

/// Open the store selected by `CLAIM_STORE_ENDPOINT`.
pub fn open_claim_store(endpoint: &ClaimStoreEndpoint) -> Result<Arc<dyn ClaimStore>, ClaimError> {
    match endpoint {
        ClaimStoreEndpoint::Memory => {
            tracing::warn!("Using in-memory claim store: claims are lost on restart and not shared between instances");
            Ok(Arc::new(MemoryClaimStore::new()))
        }
        ClaimStoreEndpoint::Sqlite(path) => {
            let store = SqliteClaimStore::open(path)?;
            tracing::info!(path = %path.display(), "Opened SQLite claim store");
            Ok(Arc::new(store))
        }
    }
}
