// ── Store: Client Pause Repository ──────────────────────────────────────
// The scheduler's (C9) backoff state: when a provider returns a rate
// limit or hard failure past the retry budget, the whole client is
// paused for `CLIENT_PAUSE_DURATION` rather than retrying individual
// queries against it.

use super::Store;
use crate::atoms::error::JobSyncResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

impl Store {
    pub fn pause_client(&self, client: &str, paused_until: DateTime<Utc>, reason: Option<&str>) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO client_pause (client, paused_until, reason, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(client) DO UPDATE SET
                paused_until = excluded.paused_until,
                reason = excluded.reason,
                updated_at = excluded.updated_at",
            params![client, paused_until.to_rfc3339(), reason],
        )?;
        Ok(())
    }

    /// Returns the pause expiry if `client` is currently paused (i.e. the
    /// stored `paused_until` is still in the future relative to `now`).
    pub fn get_active_pause(&self, client: &str, now: DateTime<Utc>) -> JobSyncResult<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row("SELECT paused_until FROM client_pause WHERE client = ?1", params![client], |r| r.get(0))
            .optional()?;
        let Some(raw) = raw else { return Ok(None) };
        let paused_until = DateTime::parse_from_rfc3339(&raw).map(|d| d.with_timezone(&Utc)).unwrap_or(now);
        Ok(if paused_until > now { Some(paused_until) } else { None })
    }

    pub fn clear_pause(&self, client: &str) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM client_pause WHERE client = ?1", params![client])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_is_active_until_it_expires() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store.pause_client("infojobs", now + chrono::Duration::hours(1), Some("rate_limited")).unwrap();
        assert!(store.get_active_pause("infojobs", now).unwrap().is_some());
        assert!(store.get_active_pause("infojobs", now + chrono::Duration::hours(2)).unwrap().is_none());
    }

    #[test]
    fn clear_pause_removes_the_row() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store.pause_client("infojobs", now + chrono::Duration::hours(1), None).unwrap();
        store.clear_pause("infojobs").unwrap();
        assert!(store.get_active_pause("infojobs", now).unwrap().is_none());
    }
}
