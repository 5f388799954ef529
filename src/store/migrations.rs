// ── Store: Schema Migrations ────────────────────────────────────────────
// Migration-file-driven, applied in name order, recorded in
// `schema_migrations`. Each migration runs inside its own transaction.

use crate::atoms::error::JobSyncResult;
use rusqlite::{params, Connection};

/// Migration files, embedded at compile time and applied in this literal
/// order (which is also their name order — `NNNN_description.sql`).
const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../../migrations/0001_init.sql"))];

pub fn apply_pending(conn: &mut Connection) -> JobSyncResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: i64 = conn.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if already_applied > 0 {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_migrations (version) VALUES (?1)", params![name])?;
        tx.commit()?;
        log::info!("[store] applied migration {}", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_cleanly_and_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_pending(&mut conn).unwrap();
        // Re-applying must be a no-op, not an error.
        apply_pending(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }
}
