// ── Store: Ingestion Runs Repository ────────────────────────────────────
// The run registry (C7). One row per query execution, counters
// accumulated in place and sealed by `finish_run`.

use super::Store;
use crate::atoms::error::JobSyncResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone, Default)]
pub struct RunCounters {
    pub pages_fetched: i64,
    pub offers_fetched: i64,
    pub offers_upserted: i64,
    pub offers_duplicates: i64,
    pub offers_skipped: i64,
    pub offers_failed: i64,
    pub companies_aggregated: i64,
    pub companies_failed: i64,
    pub rate_limit_count: i64,
    pub error_count: i64,
}

#[derive(Debug, Clone)]
pub struct IngestionRun {
    pub id: i64,
    pub provider: String,
    pub query_fingerprint: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub counters: RunCounters,
}

fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<IngestionRun> {
    Ok(IngestionRun {
        id: row.get(0)?,
        provider: row.get(1)?,
        query_fingerprint: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        status: row.get(5)?,
        counters: RunCounters {
            pages_fetched: row.get(6)?,
            offers_fetched: row.get(7)?,
            offers_upserted: row.get(8)?,
            offers_duplicates: row.get(9)?,
            offers_skipped: row.get(10)?,
            offers_failed: row.get(11)?,
            companies_aggregated: row.get(12)?,
            companies_failed: row.get(13)?,
            rate_limit_count: row.get(14)?,
            error_count: row.get(15)?,
        },
    })
}

const SELECT_COLUMNS: &str = "id, provider, query_fingerprint, started_at, finished_at, status, \
     pages_fetched, offers_fetched, offers_upserted, offers_duplicates, offers_skipped, offers_failed, \
     companies_aggregated, companies_failed, rate_limit_count, error_count";

impl Store {
    pub fn create_run(&self, provider: &str, query_fingerprint: &str, started_at: DateTime<Utc>) -> JobSyncResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ingestion_runs (provider, query_fingerprint, started_at, status) VALUES (?1, ?2, ?3, 'running')",
            params![provider, query_fingerprint, started_at.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_run_counters(&self, run_id: i64, counters: &RunCounters) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE ingestion_runs SET
                pages_fetched = ?1, offers_fetched = ?2, offers_upserted = ?3, offers_duplicates = ?4,
                offers_skipped = ?5, offers_failed = ?6, companies_aggregated = ?7, companies_failed = ?8,
                rate_limit_count = ?9, error_count = ?10
             WHERE id = ?11",
            params![
                counters.pages_fetched,
                counters.offers_fetched,
                counters.offers_upserted,
                counters.offers_duplicates,
                counters.offers_skipped,
                counters.offers_failed,
                counters.companies_aggregated,
                counters.companies_failed,
                counters.rate_limit_count,
                counters.error_count,
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: i64, status: &str, finished_at: DateTime<Utc>, counters: &RunCounters) -> JobSyncResult<()> {
        self.update_run_counters(run_id, counters)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE ingestion_runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status, finished_at.to_rfc3339(), run_id],
        )?;
        Ok(())
    }

    pub fn get_latest_run_by_query_key(&self, provider: &str, query_fingerprint: &str) -> JobSyncResult<Option<IngestionRun>> {
        let conn = self.conn.lock();
        let run = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM ingestion_runs
                     WHERE provider = ?1 AND query_fingerprint = ?2
                     ORDER BY started_at DESC LIMIT 1"
                ),
                params![provider, query_fingerprint],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_run_seals_status_and_counters() {
        let store = Store::open_in_memory().unwrap();
        let run_id = store.create_run("infojobs", "qk-1", Utc::now()).unwrap();

        let counters = RunCounters { offers_fetched: 10, offers_upserted: 7, ..Default::default() };
        store.finish_run(run_id, "success", Utc::now(), &counters).unwrap();

        let run = store.get_latest_run_by_query_key("infojobs", "qk-1").unwrap().unwrap();
        assert_eq!(run.status, "success");
        assert_eq!(run.counters.offers_upserted, 7);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn latest_run_picks_most_recent_by_start_time() {
        let store = Store::open_in_memory().unwrap();
        let older = Utc::now() - chrono::Duration::hours(1);
        let newer = Utc::now();
        let r1 = store.create_run("infojobs", "qk-1", older).unwrap();
        let r2 = store.create_run("infojobs", "qk-1", newer).unwrap();
        store.finish_run(r1, "success", older, &RunCounters::default()).unwrap();
        store.finish_run(r2, "failed", newer, &RunCounters::default()).unwrap();

        let run = store.get_latest_run_by_query_key("infojobs", "qk-1").unwrap().unwrap();
        assert_eq!(run.id, r2);
        assert_eq!(run.status, "failed");
    }
}
