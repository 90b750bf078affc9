//! Durable claim store on `SQLite`.
//!
//! One table, `claims(key, record, expires_at)`. Set-if-absent is a single
//! upsert that only overwrites a row whose TTL has passed, so two writers
//! racing on the same key (threads or processes sharing the file) cannot
//! both win.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tokendrop_types::{ClaimError, ClaimRecord};

use crate::claim_store::ClaimStore;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS claims (
    key TEXT PRIMARY KEY,
    record TEXT NOT NULL,
    expires_at INTEGER
);";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite`-backed claim store.
pub struct SqliteClaimStore {
    conn: Mutex<Connection>,
    durable: bool,
}

impl SqliteClaimStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, ClaimError> {
        let conn = Connection::open(path).map_err(ClaimError::backend)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(ClaimError::backend)?;
        Self::init(conn, true)
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, ClaimError> {
        let conn = Connection::open_in_memory().map_err(ClaimError::backend)?;
        Self::init(conn, false)
    }

    fn init(conn: Connection, durable: bool) -> Result<Self, ClaimError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(ClaimError::backend)?;
        conn.execute_batch(SCHEMA).map_err(ClaimError::backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
            durable,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ClaimError> {
        self.conn
            .lock()
            .map_err(|_| ClaimError::backend("sqlite connection lock poisoned"))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry(now: i64, ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)))
}

fn encode(record: &ClaimRecord) -> Result<String, ClaimError> {
    serde_json::to_string(record).map_err(|e| ClaimError::Serialization {
        reason: e.to_string(),
    })
}

fn decode(raw: &str) -> Result<ClaimRecord, ClaimError> {
    serde_json::from_str(raw).map_err(|e| ClaimError::Serialization {
        reason: e.to_string(),
    })
}

impl ClaimStore for SqliteClaimStore {
    fn try_set_if_absent(
        &self,
        key: &str,
        record: &ClaimRecord,
        ttl: Option<Duration>,
    ) -> Result<bool, ClaimError> {
        let now = now_millis();
        let changed = self
            .conn()?
            .execute(
                "INSERT INTO claims (key, record, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET record = excluded.record, expires_at = excluded.expires_at
                 WHERE claims.expires_at IS NOT NULL AND claims.expires_at <= ?4",
                params![key, encode(record)?, expiry(now, ttl), now],
            )
            .map_err(ClaimError::backend)?;
        Ok(changed == 1)
    }

    fn put(&self, key: &str, record: &ClaimRecord, ttl: Option<Duration>) -> Result<(), ClaimError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO claims (key, record, expires_at) VALUES (?1, ?2, ?3)",
                params![key, encode(record)?, expiry(now_millis(), ttl)],
            )
            .map_err(ClaimError::backend)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<ClaimRecord>, ClaimError> {
        let row: Option<String> = self
            .conn()?
            .query_row(
                "SELECT record FROM claims WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, now_millis()],
                |row| row.get(0),
            )
            .optional()
            .map_err(ClaimError::backend)?;
        row.as_deref().map(decode).transpose()
    }

    fn delete(&self, key: &str) -> Result<(), ClaimError> {
        self.conn()?
            .execute("DELETE FROM claims WHERE key = ?1", params![key])
            .map_err(ClaimError::backend)?;
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &ClaimRecord,
        record: &ClaimRecord,
        ttl: Option<Duration>,
    ) -> Result<bool, ClaimError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE claims SET record = ?3, expires_at = ?4 WHERE key = ?1 AND record = ?2",
                params![key, encode(expected)?, encode(record)?, expiry(now_millis(), ttl)],
            )
            .map_err(ClaimError::backend)?;
        Ok(changed == 1)
    }

    fn compare_and_delete(&self, key: &str, expected: &ClaimRecord) -> Result<bool, ClaimError> {
        let changed = self
            .conn()?
            .execute(
                "DELETE FROM claims WHERE key = ?1 AND record = ?2",
                params![key, encode(expected)?],
            )
            .map_err(ClaimError::backend)?;
        Ok(changed == 1)
    }

    fn is_durable(&self) -> bool {
        self.durable
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn health_check(&self) -> Result<(), ClaimError> {
        self.conn()?
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(ClaimError::backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tokendrop_types::TransactionId;
    use tokendrop_types::fixtures::TestClaimant;

    use super::*;

    fn record() -> (String, ClaimRecord) {
        let identity = TestClaimant::generate().identity();
        (
            ClaimRecord::store_key(&identity),
            ClaimRecord::locked(identity, Utc::now()),
        )
    }

    #[test]
    fn set_if_absent_only_once() {
        let store = SqliteClaimStore::open_in_memory().unwrap();
        let (key, rec) = record();
        assert!(store.try_set_if_absent(&key, &rec, Some(Duration::from_secs(120))).unwrap());
        assert!(!store.try_set_if_absent(&key, &rec, Some(Duration::from_secs(120))).unwrap());
        assert_eq!(store.get(&key).unwrap(), Some(rec));
    }

    #[test]
    fn permanent_record_never_overwritten() {
        let store = SqliteClaimStore::open_in_memory().unwrap();
        let (key, mut rec) = record();
        rec.mark_finalized(TransactionId::new("tx1"), Utc::now()).unwrap();
        store.put(&key, &rec, None).unwrap();
        let (_, other) = record();
        assert!(!store.try_set_if_absent(&key, &other, None).unwrap());
        assert!(store.get(&key).unwrap().unwrap().is_finalized());
    }

    #[test]
    fn expired_lock_can_be_taken_over() {
        let store = SqliteClaimStore::open_in_memory().unwrap();
        let (key, rec) = record();
        assert!(store.try_set_if_absent(&key, &rec, Some(Duration::from_millis(10))).unwrap());
        thread::sleep(Duration::from_millis(30));
        assert!(store.get(&key).unwrap().is_none());
        assert!(store.try_set_if_absent(&key, &rec, Some(Duration::from_secs(60))).unwrap());
    }

    #[test]
    fn delete_then_reacquire() {
        let store = SqliteClaimStore::open_in_memory().unwrap();
        let (key, rec) = record();
        store.try_set_if_absent(&key, &rec, None).unwrap();
        store.delete(&key).unwrap();
        assert!(store.try_set_if_absent(&key, &rec, None).unwrap());
    }

    #[test]
    fn conditional_delete_leaves_a_newer_holder_alone() {
        let store = SqliteClaimStore::open_in_memory().unwrap();
        let (key, first) = record();
        assert!(store.try_set_if_absent(&key, &first, Some(Duration::from_millis(10))).unwrap());
        thread::sleep(Duration::from_millis(30));

        let second = ClaimRecord::locked(first.identity.clone(), Utc::now());
        assert!(store.try_set_if_absent(&key, &second, Some(Duration::from_secs(60))).unwrap());

        assert!(!store.compare_and_delete(&key, &first).unwrap());
        assert_eq!(store.get(&key).unwrap(), Some(second.clone()));
        assert!(store.compare_and_delete(&key, &second).unwrap());
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn conditional_swap_finalizes_own_lock_only() {
        let store = SqliteClaimStore::open_in_memory().unwrap();
        let (key, held) = record();
        store.try_set_if_absent(&key, &held, Some(Duration::from_secs(60))).unwrap();

        let stranger = ClaimRecord::locked(held.identity.clone(), held.locked_at);
        let mut finalized = held.clone();
        finalized.mark_finalized(TransactionId::new("tx1"), Utc::now()).unwrap();
        assert!(!store.compare_and_swap(&key, &stranger, &finalized, None).unwrap());
        assert!(store.compare_and_swap(&key, &held, &finalized, None).unwrap());

        // Permanent now: the expiry was cleared.
        assert!(!store.try_set_if_absent(&key, &stranger, None).unwrap());
        assert!(store.get(&key).unwrap().unwrap().is_finalized());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.db");
        let (key, rec) = record();
        {
            let store = SqliteClaimStore::open(&path).unwrap();
            assert!(store.try_set_if_absent(&key, &rec, None).unwrap());
        }
        let store = SqliteClaimStore::open(&path).unwrap();
        assert!(store.is_durable());
        assert_eq!(store.get(&key).unwrap(), Some(rec.clone()));
        assert!(!store.try_set_if_absent(&key, &rec, None).unwrap());
    }

    #[test]
    fn corrupt_row_is_serialization_error() {
        let store = SqliteClaimStore::open_in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO claims (key, record, expires_at) VALUES ('claim:x', 'not json', NULL)",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.get("claim:x"),
            Err(ClaimError::Serialization { .. })
        ));
    }

    #[test]
    fn concurrent_set_has_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteClaimStore::open(&dir.path().join("claims.db")).unwrap());
        let (key, rec) = record();
        let wins: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        store
                            .try_set_if_absent(&key, &rec, Some(Duration::from_secs(120)))
                            .unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });
        assert_eq!(wins, 1);
    }
}
