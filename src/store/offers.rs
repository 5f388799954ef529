// ── Store: Offers Repository ────────────────────────────────────────────
// `upsert_offer` relies on SQLite's native `ON CONFLICT ... DO UPDATE`
// so a single statement covers both the "found → overwrite" and
// "not found → insert canonical" branches of persisting one offer. The
// canonical/repost columns are deliberately left out of the
// `DO UPDATE SET` list because they are owned by
// `increment_offer_repost_count` / `update_offer_canonical`, not by the
// plain upsert path.

use super::Store;
use crate::atoms::error::JobSyncResult;
use crate::atoms::types::ProviderTag;
use crate::repost::CanonicalOfferCandidate;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct Offer {
    pub id: i64,
    pub provider: String,
    pub provider_offer_id: String,
    pub url: Option<String>,
    pub company_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub published_at: Option<String>,
    pub updated_at: Option<String>,
    pub created_at: Option<String>,
    pub canonical_offer_id: Option<i64>,
    pub repost_count: i64,
    pub content_fingerprint: Option<String>,
    pub last_seen_at: String,
}

#[derive(Debug, Clone)]
pub struct OfferUpsert {
    pub provider: ProviderTag,
    pub provider_offer_id: String,
    pub url: Option<String>,
    pub company_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub content_fingerprint: Option<String>,
    pub last_seen_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "id, provider, provider_offer_id, url, company_id, title, description, requirements, \
     published_at, updated_at, created_at, canonical_offer_id, repost_count, content_fingerprint, last_seen_at";

fn row_to_offer(row: &rusqlite::Row) -> rusqlite::Result<Offer> {
    Ok(Offer {
        id: row.get(0)?,
        provider: row.get(1)?,
        provider_offer_id: row.get(2)?,
        url: row.get(3)?,
        company_id: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        requirements: row.get(7)?,
        published_at: row.get(8)?,
        updated_at: row.get(9)?,
        created_at: row.get(10)?,
        canonical_offer_id: row.get(11)?,
        repost_count: row.get(12)?,
        content_fingerprint: row.get(13)?,
        last_seen_at: row.get(14)?,
    })
}

impl Store {
    /// Insert-or-overwrite by `(provider, provider_offer_id)` (invariant
    /// I5). Nullable incoming values overwrite stored ones with null
    /// — this is deliberate, not an oversight.
    pub fn upsert_offer(&self, input: &OfferUpsert) -> JobSyncResult<i64> {
        let conn = self.conn.lock();
        let id: i64 = conn.query_row(
            "INSERT INTO offers (
                provider, provider_offer_id, url, company_id, title, description, requirements,
                published_at, updated_at, created_at, content_fingerprint, last_seen_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(provider, provider_offer_id) DO UPDATE SET
                url = excluded.url,
                company_id = excluded.company_id,
                title = excluded.title,
                description = excluded.description,
                requirements = excluded.requirements,
                published_at = excluded.published_at,
                updated_at = excluded.updated_at,
                created_at = excluded.created_at,
                content_fingerprint = excluded.content_fingerprint,
                last_seen_at = excluded.last_seen_at
             RETURNING id",
            params![
                input.provider.as_str(),
                input.provider_offer_id,
                input.url,
                input.company_id,
                input.title,
                input.description,
                input.requirements,
                input.published_at.map(|d| d.to_rfc3339()),
                input.updated_at.map(|d| d.to_rfc3339()),
                input.created_at.map(|d| d.to_rfc3339()),
                input.content_fingerprint,
                input.last_seen_at.to_rfc3339(),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_offer_by_provider_id(&self, provider: ProviderTag, provider_offer_id: &str) -> JobSyncResult<Option<Offer>> {
        let conn = self.conn.lock();
        let offer = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM offers WHERE provider = ?1 AND provider_offer_id = ?2"),
                params![provider.as_str(), provider_offer_id],
                row_to_offer,
            )
            .optional()?;
        Ok(offer)
    }

    pub fn get_offer_by_id(&self, id: i64) -> JobSyncResult<Option<Offer>> {
        let conn = self.conn.lock();
        let offer = conn
            .query_row(&format!("SELECT {SELECT_COLUMNS} FROM offers WHERE id = ?1"), params![id], row_to_offer)
            .optional()?;
        Ok(offer)
    }

    pub fn update_offer_last_seen_at(&self, id: i64, at: DateTime<Utc>) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE offers SET last_seen_at = ?1 WHERE id = ?2 AND last_seen_at < ?1",
            params![at.to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Sets `canonical_offer_id` on a row. Not exercised by the normal
    /// ingestion flow — reposts are never inserted as rows (GLOSSARY) —
    /// kept for schema completeness and invariant I6 tests.
    pub fn update_offer_canonical(&self, offer_id: i64, canonical_offer_id: Option<i64>) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute("UPDATE offers SET canonical_offer_id = ?1 WHERE id = ?2", params![canonical_offer_id, offer_id])?;
        Ok(())
    }

    pub fn find_canonical_offers_by_fingerprint(
        &self,
        company_id: i64,
        fingerprint: &str,
    ) -> JobSyncResult<Vec<CanonicalOfferCandidate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, description, last_seen_at FROM offers
             WHERE company_id = ?1 AND canonical_offer_id IS NULL AND content_fingerprint = ?2
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![company_id, fingerprint], row_to_candidate)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_canonical_offers_for_repost(&self, company_id: i64) -> JobSyncResult<Vec<CanonicalOfferCandidate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, description, last_seen_at FROM offers
             WHERE company_id = ?1 AND canonical_offer_id IS NULL
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![company_id], row_to_candidate)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Increments `repost_count` by 1 and advances `last_seen_at`
    /// monotonically (never decreases it) on the canonical row.
    pub fn increment_offer_repost_count(&self, canonical_id: i64, last_seen_at: DateTime<Utc>) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE offers SET
                repost_count = repost_count + 1,
                last_seen_at = CASE WHEN last_seen_at < ?1 THEN ?1 ELSE last_seen_at END
             WHERE id = ?2",
            params![last_seen_at.to_rfc3339(), canonical_id],
        )?;
        Ok(())
    }

    /// Irreversible: deletes every offer row for `company_id`. Returns
    /// the count deleted. Relies on `matches` cascading via its
    /// `ON DELETE CASCADE` foreign key.
    pub fn delete_offers_for_company(&self, company_id: i64) -> JobSyncResult<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM offers WHERE company_id = ?1", params![company_id])?;
        Ok(deleted)
    }
}

impl Store {
    /// Canonical offers of `company_id` joined with their match (if
    /// scored), as consumed by the aggregator (C5). Offers with no match
    /// row yet contribute `score: None, category_id: None`.
    pub fn load_canonical_offer_facts(&self, company_id: i64) -> JobSyncResult<Vec<crate::aggregator::CanonicalOfferFacts>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT o.id, o.repost_count, o.published_at, m.score, m.category_id
             FROM offers o
             LEFT JOIN matches m ON m.offer_id = o.id
             WHERE o.company_id = ?1 AND o.canonical_offer_id IS NULL
             ORDER BY o.id",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            let published_raw: Option<String> = row.get(2)?;
            let published_at = published_raw
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|d| d.with_timezone(&Utc));
            Ok(crate::aggregator::CanonicalOfferFacts {
                offer_id: row.get(0)?,
                repost_count: row.get(1)?,
                published_at,
                score: row.get(3)?,
                category_id: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<CanonicalOfferCandidate> {
    let last_seen_raw: String = row.get(3)?;
    let last_seen_at = DateTime::parse_from_rfc3339(&last_seen_raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(CanonicalOfferCandidate { id: row.get(0)?, title: row.get(1)?, description: row.get(2)?, last_seen_at })
}
