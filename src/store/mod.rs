// ── Store (C1) ──────────────────────────────────────────────────────────
// Persistent relational state; schema migrations; typed repositories;
// transactional boundaries.
//
// A single `rusqlite::Connection` behind a `parking_lot::Mutex`, opened
// once and shared for the process lifetime. Every public method here
// either commits or leaves state unchanged — no method returns a
// half-applied write.

pub mod companies;
pub mod feedback_events;
pub mod lock;
pub mod matches;
pub mod migrations;
pub mod offers;
pub mod pause;
pub mod query_state;
pub mod runs;

use crate::atoms::error::JobSyncResult;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

pub struct Store {
    pub(crate) conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file, apply pending migrations, and
    /// run startup housekeeping.
    pub fn open(path: &Path) -> JobSyncResult<Self> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        migrations::apply_pending(&mut conn)?;
        let store = Store { conn: Mutex::new(conn) };
        store.reclaim_stale_lock()?;
        Ok(store)
    }

    /// In-memory store for tests: same schema, no file on disk.
    pub fn open_in_memory() -> JobSyncResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::apply_pending(&mut conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    /// Startup housekeeping: reclaim a run lock whose `expires_at` has
    /// already passed, so a crashed prior process does not wedge the
    /// next cycle. Safe to call repeatedly.
    fn reclaim_stale_lock(&self) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM run_lock WHERE expires_at < datetime('now')",
            [],
        )?;
        if deleted > 0 {
            log::warn!("[store] reclaimed {} stale run lock row(s) at startup", deleted);
        }
        Ok(())
    }
}
