//! In-process claim store.
//!
//! A mutex-guarded map with per-entry expiry. Safe under concurrent access
//! within one process, but records are lost on restart and are not shared
//! across instances. This is a degraded mode; production deployments use
//! a durable store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokendrop_types::{ClaimError, ClaimRecord};

use crate::claim_store::ClaimStore;

/// Minimum spacing between sweeps of expired entries.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    record: ClaimRecord,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(record: &ClaimRecord, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            record: record.clone(),
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

struct Entries {
    map: HashMap<String, Entry>,
    next_purge: Instant,
}

impl Entries {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, e| e.is_live(now));
        self.next_purge = now + PURGE_INTERVAL;
        before - self.map.len()
    }
}

/// Non-durable claim store backed by a `HashMap`.
///
/// Expired LOCKED entries are swept on the acquire path at most once per
/// [`PURGE_INTERVAL`], so abandoned locks do not accumulate.
pub struct MemoryClaimStore {
    entries: Mutex<Entries>,
}

impl Default for MemoryClaimStore {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                next_purge: Instant::now() + PURGE_INTERVAL,
            }),
        }
    }
}

impl MemoryClaimStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, Entries>, ClaimError> {
        self.entries
            .lock()
            .map_err(|_| ClaimError::backend("memory claim store lock poisoned"))
    }

    /// Drop expired entries now. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, ClaimError> {
        Ok(self.entries()?.purge_expired(Instant::now()))
    }
}

impl ClaimStore for MemoryClaimStore {
    fn try_set_if_absent(
        &self,
        key: &str,
        record: &ClaimRecord,
        ttl: Option<Duration>,
    ) -> Result<bool, ClaimError> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        if now >= entries.next_purge {
            let purged = entries.purge_expired(now);
            if purged > 0 {
                tracing::debug!(purged, "Purged expired claim entries");
            }
        }
        if entries.map.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.map.insert(key.to_string(), Entry::new(record, ttl, now));
        Ok(true)
    }

    fn put(&self, key: &str, record: &ClaimRecord, ttl: Option<Duration>) -> Result<(), ClaimError> {
        let now = Instant::now();
        self.entries()?
            .map
            .insert(key.to_string(), Entry::new(record, ttl, now));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<ClaimRecord>, ClaimError> {
        let now = Instant::now();
        Ok(self
            .entries()?
            .map
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.record.clone()))
    }

    fn delete(&self, key: &str) -> Result<(), ClaimError> {
        self.entries()?.map.remove(key);
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &ClaimRecord,
        record: &ClaimRecord,
        ttl: Option<Duration>,
    ) -> Result<bool, ClaimError> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        match entries.map.get_mut(key) {
            Some(entry) if entry.record == *expected => {
                *entry = Entry::new(record, ttl, now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn compare_and_delete(&self, key: &str, expected: &ClaimRecord) -> Result<bool, ClaimError> {
        let mut entries = self.entries()?;
        if entries.map.get(key).is_some_and(|e| e.record == *expected) {
            entries.map.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
