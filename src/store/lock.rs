// ── Store: Run Lock Repository ──────────────────────────────────────────
// A single named mutex row guarding one ingestion cycle at a time
// (C8), TTL-bounded so a crashed holder cannot wedge the lock forever
// (`Store::reclaim_stale_lock` also sweeps this at
// startup). Acquisition is a single conditional INSERT — no read then
// write — to avoid a race between two processes.

use super::Store;
use crate::atoms::constants::RUN_LOCK_TTL;
use crate::atoms::error::JobSyncResult;
use chrono::{DateTime, Utc};
use rusqlite::params;

impl Store {
    /// Attempts to acquire `lock_name` for `owner_id`. Succeeds if no row
    /// exists, or the existing row has expired. Returns `true` on
    /// acquisition, `false` if another live owner holds it.
    pub fn try_acquire_lock(&self, lock_name: &str, owner_id: &str, now: DateTime<Utc>) -> JobSyncResult<bool> {
        let conn = self.conn.lock();
        let expires_at = now + RUN_LOCK_TTL;
        let changed = conn.execute(
            "INSERT INTO run_lock (lock_name, owner_id, acquired_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(lock_name) DO UPDATE SET
                owner_id = excluded.owner_id,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
             WHERE run_lock.expires_at < ?3",
            params![lock_name, owner_id, now.to_rfc3339(), expires_at.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// Releases the lock only if still held by `owner_id` — a stale
    /// owner's delayed release must not evict a newer holder.
    pub fn release_lock(&self, lock_name: &str, owner_id: &str) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM run_lock WHERE lock_name = ?1 AND owner_id = ?2",
            params![lock_name, owner_id],
        )?;
        Ok(())
    }

    /// Extends the TTL of a lock still held by `owner_id`, for long
    /// running cycles that outlive a single `RUN_LOCK_TTL` window.
    pub fn renew_lock(&self, lock_name: &str, owner_id: &str, now: DateTime<Utc>) -> JobSyncResult<bool> {
        let conn = self.conn.lock();
        let expires_at = now + RUN_LOCK_TTL;
        let changed = conn.execute(
            "UPDATE run_lock SET expires_at = ?1 WHERE lock_name = ?2 AND owner_id = ?3",
            params![expires_at.to_rfc3339(), lock_name, owner_id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_owner_cannot_acquire_a_live_lock() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        assert!(store.try_acquire_lock("ingestion_cycle", "owner-a", now).unwrap());
        assert!(!store.try_acquire_lock("ingestion_cycle", "owner-b", now).unwrap());
    }

    #[test]
    fn lock_can_be_reacquired_after_expiry() {
        let store = Store::open_in_memory().unwrap();
        let acquired_at = Utc::now() - chrono::Duration::hours(1);
        assert!(store.try_acquire_lock("ingestion_cycle", "owner-a", acquired_at).unwrap());

        let now = Utc::now();
        assert!(store.try_acquire_lock("ingestion_cycle", "owner-b", now).unwrap());
    }

    #[test]
    fn release_is_a_no_op_for_the_wrong_owner() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store.try_acquire_lock("ingestion_cycle", "owner-a", now).unwrap();
        store.release_lock("ingestion_cycle", "owner-b").unwrap();
        assert!(!store.try_acquire_lock("ingestion_cycle", "owner-c", now).unwrap());
    }
}
