// ── Store: Matches Repository ───────────────────────────────────────────
// One row per offer (`offer_id` is UNIQUE), so scoring an offer a
// second time overwrites the prior verdict rather than accumulating
// history.

use super::Store;
use crate::atoms::error::JobSyncResult;
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct Match {
    pub id: i64,
    pub offer_id: i64,
    pub score: i64,
    pub detail: String,
    pub category_id: Option<String>,
    pub computed_at: String,
}

impl Store {
    pub fn upsert_match(&self, offer_id: i64, score: i64, detail: &str, category_id: Option<&str>) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO matches (offer_id, score, detail, category_id, computed_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(offer_id) DO UPDATE SET
                score = excluded.score,
                detail = excluded.detail,
                category_id = excluded.category_id,
                computed_at = excluded.computed_at",
            params![offer_id, score, detail, category_id],
        )?;
        Ok(())
    }

    pub fn get_match_by_offer_id(&self, offer_id: i64) -> JobSyncResult<Option<Match>> {
        let conn = self.conn.lock();
        let m = conn
            .query_row(
                "SELECT id, offer_id, score, detail, category_id, computed_at FROM matches WHERE offer_id = ?1",
                params![offer_id],
                |row| {
                    Ok(Match {
                        id: row.get(0)?,
                        offer_id: row.get(1)?,
                        score: row.get(2)?,
                        detail: row.get(3)?,
                        category_id: row.get(4)?,
                        computed_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(m)
    }

    /// All scored, non-repost offers for a company — the aggregator's
    /// (C5) input set.
    pub fn list_matches_for_company(&self, company_id: i64) -> JobSyncResult<Vec<Match>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.offer_id, m.score, m.detail, m.category_id, m.computed_at
             FROM matches m
             JOIN offers o ON o.id = m.offer_id
             WHERE o.company_id = ?1 AND o.canonical_offer_id IS NULL
             ORDER BY m.offer_id",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok(Match {
                id: row.get(0)?,
                offer_id: row.get(1)?,
                score: row.get(2)?,
                detail: row.get(3)?,
                category_id: row.get(4)?,
                computed_at: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
