//! At-most-once claim locking.
//!
//! The lock is the only writer of `claim:<identity>` keys:
//!
//! - `acquire`: one atomic set-if-absent of a LOCKED record with the lock
//!   TTL, so a crashed holder cannot block the claimant forever
//! - `finalize`: swap the holder's own LOCKED record for FINALIZED
//!   (permanent, or the cooldown TTL)
//! - `release`: delete the key, but only while it still holds the
//!   holder's own record
//!
//! Each acquisition carries a unique `lock_id`, so a holder whose lock
//! lapsed can never release or finalize a newer holder's lock by accident.
//!
//! Store backends are synchronous. Every call runs on the blocking pool so
//! a contended `SQLite` file never stalls the async workers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokendrop_types::{ClaimError, ClaimIdentity, ClaimRecord, ClaimState, TransactionId};

use crate::claim_store::ClaimStore;

/// Result of trying to take the claim lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// This caller now holds the lock; keep the record to finalize or release.
    Acquired(ClaimRecord),
    /// Another request holds the lock or the claim is already paid.
    AlreadyClaimed(Option<ClaimRecord>),
}

impl AcquireOutcome {
    #[must_use]
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }
}

/// Claim lock protocol over a [`ClaimStore`].
#[derive(Clone)]
pub struct ClaimLock {
    store: Arc<dyn ClaimStore>,
    lock_ttl: Duration,
    cooldown: Option<Duration>,
}

impl ClaimLock {
    pub fn new(store: Arc<dyn ClaimStore>, lock_ttl: Duration, cooldown: Option<Duration>) -> Self {
        Self {
            store,
            lock_ttl,
            cooldown,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ClaimStore> {
        &self.store
    }

    #[must_use]
    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, ClaimError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ClaimStore) -> Result<T, ClaimError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| ClaimError::backend(format!("claim store task aborted: {e}")))?
    }

    pub async fn acquire(&self, identity: &ClaimIdentity, now: DateTime<Utc>) -> Result<AcquireOutcome, ClaimError> {
        let key = ClaimRecord::store_key(identity);
        let record = ClaimRecord::locked(identity.clone(), now);
        let ttl = self.lock_ttl;

        let held = record.clone();
        let (acquired, existing) = self
            .blocking(move |store| {
                if store.try_set_if_absent(&key, &held, Some(ttl))? {
                    return Ok((true, None));
                }
                // Best effort: the record may have been released in between.
                let existing = store.get(&key).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Could not read existing claim");
                    None
                });
                Ok((false, existing))
            })
            .await?;

        if acquired {
            tracing::debug!(
                identity = %identity.short(),
                lock_id = %record.lock_id,
                ttl_secs = ttl.as_secs(),
                "Claim lock acquired"
            );
            return Ok(AcquireOutcome::Acquired(record));
        }
        Ok(AcquireOutcome::AlreadyClaimed(existing))
    }

    /// Record the paid claim held by `held`.
    ///
    /// Safe to retry: finalizing a claim this holder already finalized
    /// returns the stored record. If the lock lapsed during a slow transfer
    /// the FINALIZED record is still written, because the payout happened.
    pub async fn finalize(
        &self,
        held: &ClaimRecord,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<ClaimRecord, ClaimError> {
        let mut finalized = held.clone();
        finalized.mark_finalized(transaction_id, now)?;

        let key = ClaimRecord::store_key(&held.identity);
        let expected = held.clone();
        let record = finalized.clone();
        let ttl = self.cooldown;
        let short = held.identity.short().to_string();

        self.blocking(move |store| {
            if store.compare_and_swap(&key, &expected, &record, ttl)? {
                return Ok(record);
            }
            if store.try_set_if_absent(&key, &record, ttl)? {
                tracing::warn!(identity = %short, "Claim lock expired before finalize");
                return Ok(record);
            }
            match store.get(&key)? {
                Some(current) if current.is_finalized() && current.lock_id == expected.lock_id => Ok(current),
                Some(current) if current.is_finalized() => Err(ClaimError::InvalidTransition {
                    from: ClaimState::Finalized,
                    to: ClaimState::Finalized,
                }),
                current => {
                    if current.is_some_and(|c| !c.is_lock_of(&expected)) {
                        tracing::error!(
                            identity = %short,
                            "Claim lock was taken over during the transfer; recording this payout"
                        );
                    }
                    store.put(&key, &record, ttl)?;
                    Ok(record)
                }
            }
        })
        .await
    }

    /// Last resort after [`finalize`](Self::finalize) keeps failing: write a
    /// FINALIZED record with no expiry, whatever the key currently holds.
    pub async fn record_permanent(
        &self,
        held: &ClaimRecord,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<ClaimRecord, ClaimError> {
        let mut finalized = held.clone();
        finalized.mark_finalized(transaction_id, now)?;
        let key = ClaimRecord::store_key(&held.identity);
        let record = finalized.clone();
        self.blocking(move |store| store.put(&key, &record, None)).await?;
        Ok(finalized)
    }

    /// Give up the lock held by `held`. Returns `false` when the key no
    /// longer holds that lock (it lapsed, or another request took it over),
    /// in which case nothing is deleted.
    pub async fn release(&self, held: &ClaimRecord) -> Result<bool, ClaimError> {
        let key = ClaimRecord::store_key(&held.identity);
        let expected = held.clone();
        let released = self
            .blocking(move |store| store.compare_and_delete(&key, &expected))
            .await?;
        if released {
            tracing::debug!(identity = %held.identity.short(), "Claim lock released");
        } else {
            tracing::warn!(
                identity = %held.identity.short(),
                lock_id = %held.lock_id,
                "Claim lock no longer held; nothing released"
            );
        }
        Ok(released)
    }

    /// Current record for `identity`, if any.
    pub async fn status(&self, identity: &ClaimIdentity) -> Result<Option<ClaimRecord>, ClaimError> {
        let key = ClaimRecord::store_key(identity);
        self.blocking(move |store| store.get(&key)).await
    }

    pub async fn health_check(&self) -> Result<(), ClaimError> {
        self.blocking(|store| store.health_check()).await
    }
}
