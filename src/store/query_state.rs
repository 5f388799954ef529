// ── Store: Query State Repository ───────────────────────────────────────
// The scheduler's (C9) per-query bookkeeping. One row per static query
// in the registry, tracking retry/backoff state across cycles.

use super::Store;
use crate::atoms::error::JobSyncResult;
use crate::atoms::types::ProviderTag;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct QueryState {
    pub query_key: String,
    pub client: String,
    pub name: String,
    pub status: String,
    pub last_run_at: Option<String>,
    pub last_success_at: Option<String>,
    pub last_error_at: Option<String>,
    pub consecutive_failures: i64,
    pub last_error_code: Option<String>,
    pub last_error_message: Option<String>,
    pub last_processed_date: Option<String>,
}

const SELECT_COLUMNS: &str = "query_key, client, name, status, last_run_at, last_success_at, last_error_at, \
     consecutive_failures, last_error_code, last_error_message, last_processed_date";

fn row_to_state(row: &rusqlite::Row) -> rusqlite::Result<QueryState> {
    Ok(QueryState {
        query_key: row.get(0)?,
        client: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        last_run_at: row.get(4)?,
        last_success_at: row.get(5)?,
        last_error_at: row.get(6)?,
        consecutive_failures: row.get(7)?,
        last_error_code: row.get(8)?,
        last_error_message: row.get(9)?,
        last_processed_date: row.get(10)?,
    })
}

impl Store {
    pub fn get_query_state(&self, query_key: &str) -> JobSyncResult<Option<QueryState>> {
        let conn = self.conn.lock();
        let state = conn
            .query_row(&format!("SELECT {SELECT_COLUMNS} FROM query_state WHERE query_key = ?1"), params![query_key], row_to_state)
            .optional()?;
        Ok(state)
    }

    pub fn list_query_states(&self) -> JobSyncResult<Vec<QueryState>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM query_state ORDER BY query_key"))?;
        let rows = stmt.query_map([], row_to_state)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Ensures a row exists for `query_key` (first time a registered
    /// query is seen), defaulting to IDLE with zero failures.
    pub fn ensure_query_state(&self, query_key: &str, client: ProviderTag, name: &str) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO query_state (query_key, client, name, status) VALUES (?1, ?2, ?3, 'IDLE')
             ON CONFLICT(query_key) DO NOTHING",
            params![query_key, client.as_str(), name],
        )?;
        Ok(())
    }

    /// Marks a query as actively running, ahead of invoking its runner
    ///.
    pub fn mark_query_running(&self, query_key: &str) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute("UPDATE query_state SET status = 'RUNNING' WHERE query_key = ?1", params![query_key])?;
        Ok(())
    }

    /// Records a successful run: resets the failure streak and clears
    /// any stored error.
    pub fn record_query_success(&self, query_key: &str, ran_at: DateTime<Utc>, processed_date: Option<&str>) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE query_state SET
                status = 'IDLE',
                last_run_at = ?1,
                last_success_at = ?1,
                consecutive_failures = 0,
                last_error_code = NULL,
                last_error_message = NULL,
                last_processed_date = COALESCE(?2, last_processed_date)
             WHERE query_key = ?3",
            params![ran_at.to_rfc3339(), processed_date, query_key],
        )?;
        Ok(())
    }

    /// Records a failed run: bumps the failure streak and stores the
    /// error, truncated to `ERROR_MESSAGE_MAX_LEN` by the caller.
    pub fn record_query_failure(
        &self,
        query_key: &str,
        ran_at: DateTime<Utc>,
        error_code: &str,
        error_message: &str,
    ) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE query_state SET
                status = 'FAILING',
                last_run_at = ?1,
                last_error_at = ?1,
                consecutive_failures = consecutive_failures + 1,
                last_error_code = ?2,
                last_error_message = ?3
             WHERE query_key = ?4",
            params![ran_at.to_rfc3339(), error_code, error_message, query_key],
        )?;
        Ok(())
    }
}
