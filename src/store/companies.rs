// ── Store: Companies Repository ─────────────────────────────────────────
// Identity resolution's enrich-or-insert discipline, backed by SQLite.

use super::Store;
use crate::atoms::error::JobSyncResult;
use crate::atoms::types::Resolution;
use crate::identity::{EnrichmentCandidate, IdentityKey};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct Company {
    pub id: i64,
    pub display_name: Option<String>,
    pub raw_name: Option<String>,
    pub normalized_name: Option<String>,
    pub website_url: Option<String>,
    pub website_domain: Option<String>,
    pub max_score: i64,
    pub offer_count: i64,
    pub unique_offer_count: i64,
    pub strong_offer_count: i64,
    pub avg_strong_score: Option<f64>,
    pub top_category_id: Option<String>,
    pub top_offer_id: Option<i64>,
    pub category_max_scores: String,
    pub last_strong_at: Option<String>,
    pub resolution: Resolution,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields recomputed by the aggregator (C5), written in one partial
/// update that never touches `resolution` or identity columns (G-AGG).
#[derive(Debug, Clone, Default)]
pub struct AggregationUpdate {
    pub max_score: i64,
    pub offer_count: i64,
    pub unique_offer_count: i64,
    pub strong_offer_count: i64,
    pub avg_strong_score: Option<f64>,
    pub top_category_id: Option<String>,
    pub top_offer_id: Option<i64>,
    pub category_max_scores: String,
    pub last_strong_at: Option<String>,
}

const SELECT_COLUMNS: &str = "id, display_name, raw_name, normalized_name, website_url, website_domain, \
     max_score, offer_count, unique_offer_count, strong_offer_count, avg_strong_score, \
     top_category_id, top_offer_id, category_max_scores, last_strong_at, resolution, created_at, updated_at";

fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
    let resolution_str: String = row.get(15)?;
    Ok(Company {
        id: row.get(0)?,
        display_name: row.get(1)?,
        raw_name: row.get(2)?,
        normalized_name: row.get(3)?,
        website_url: row.get(4)?,
        website_domain: row.get(5)?,
        max_score: row.get(6)?,
        offer_count: row.get(7)?,
        unique_offer_count: row.get(8)?,
        strong_offer_count: row.get(9)?,
        avg_strong_score: row.get(10)?,
        top_category_id: row.get(11)?,
        top_offer_id: row.get(12)?,
        category_max_scores: row.get(13)?,
        last_strong_at: row.get(14)?,
        resolution: Resolution::parse(&resolution_str).unwrap_or(Resolution::Pending),
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

impl Store {
    /// Resolve `key` to a company id, enriching a matching row's null
    /// columns in place or inserting a new row. Never overwrites a
    /// non-null stored column with a null candidate value — implemented
    /// via `COALESCE(existing, candidate)` in a single statement rather
    /// than a separate select-then-conditionally-update round trip.
    pub fn find_or_create_company(&self, key: &IdentityKey, candidate: &EnrichmentCandidate) -> JobSyncResult<i64> {
        let conn = self.conn.lock();
        let existing: Option<i64> = match key {
            IdentityKey::Domain(domain) => conn
                .query_row("SELECT id FROM companies WHERE website_domain = ?1", params![domain], |r| r.get(0))
                .optional()?,
            IdentityKey::NormalizedName(name) => conn
                .query_row("SELECT id FROM companies WHERE normalized_name = ?1", params![name], |r| r.get(0))
                .optional()?,
        };

        if let Some(id) = existing {
            conn.execute(
                "UPDATE companies SET
                    display_name = COALESCE(display_name, ?1),
                    raw_name = COALESCE(raw_name, ?2),
                    normalized_name = COALESCE(normalized_name, ?3),
                    website_url = COALESCE(website_url, ?4),
                    website_domain = COALESCE(website_domain, ?5),
                    updated_at = datetime('now')
                 WHERE id = ?6",
                params![
                    candidate.name,
                    candidate.raw_name,
                    candidate.normalized_name,
                    candidate.website_url,
                    candidate.website_domain,
                    id,
                ],
            )?;
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO companies (display_name, raw_name, normalized_name, website_url, website_domain)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                candidate.name,
                candidate.raw_name,
                candidate.normalized_name,
                candidate.website_url,
                candidate.website_domain,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_company_by_id(&self, id: i64) -> JobSyncResult<Option<Company>> {
        let conn = self.conn.lock();
        let company = conn
            .query_row(&format!("SELECT {SELECT_COLUMNS} FROM companies WHERE id = ?1"), params![id], row_to_company)
            .optional()?;
        Ok(company)
    }

    pub fn list_all_companies(&self) -> JobSyncResult<Vec<Company>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM companies ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_company)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Companies active (not resolved) with no recorded ATS company
    /// source yet — candidates for ATS tenant discovery.
    pub fn list_companies_needing_ats_discovery(&self) -> JobSyncResult<Vec<Company>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM companies c
             WHERE c.resolution NOT IN ('ACCEPTED', 'REJECTED', 'ALREADY_REVOLUT')
               AND NOT EXISTS (
                   SELECT 1 FROM company_sources cs
                   WHERE cs.company_id = c.id AND cs.provider IN ('greenhouse', 'ashby')
               )
             ORDER BY c.id"
        ))?;
        let rows = stmt.query_map([], row_to_company)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Partial update of aggregation fields only (G-AGG guarantee):
    /// `resolution` and identity columns are never touched here.
    pub fn update_company_aggregation(&self, company_id: i64, update: &AggregationUpdate) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE companies SET
                max_score = ?1,
                offer_count = ?2,
                unique_offer_count = ?3,
                strong_offer_count = ?4,
                avg_strong_score = ?5,
                top_category_id = ?6,
                top_offer_id = ?7,
                category_max_scores = ?8,
                last_strong_at = ?9,
                updated_at = datetime('now')
             WHERE id = ?10",
            params![
                update.max_score,
                update.offer_count,
                update.unique_offer_count,
                update.strong_offer_count,
                update.avg_strong_score,
                update.top_category_id,
                update.top_offer_id,
                update.category_max_scores,
                update.last_strong_at,
                company_id,
            ],
        )?;
        Ok(())
    }

    /// Touches only `resolution` and `updated_at` — aggregation metric
    /// columns are preserved byte-for-byte.
    pub fn update_company_resolution(&self, company_id: i64, resolution: Resolution) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE companies SET resolution = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![resolution.as_str(), company_id],
        )?;
        Ok(())
    }

    pub fn upsert_company_source(
        &self,
        company_id: i64,
        provider: &str,
        provider_company_id: Option<&str>,
        provider_url: Option<&str>,
    ) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM company_sources WHERE company_id = ?1 AND provider = ?2",
                params![company_id, provider],
                |r| r.get(0),
            )
            .optional()?;
        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE company_sources SET
                        provider_company_id = COALESCE(provider_company_id, ?1),
                        provider_url = COALESCE(provider_url, ?2),
                        updated_at = datetime('now')
                     WHERE id = ?3",
                    params![provider_company_id, provider_url, id],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO company_sources (company_id, provider, provider_company_id, provider_url)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![company_id, provider, provider_company_id, provider_url],
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EnrichmentCandidate;

    fn candidate(name: &str, domain: Option<&str>) -> EnrichmentCandidate {
        EnrichmentCandidate {
            name: Some(name.to_string()),
            raw_name: Some(name.to_string()),
            normalized_name: Some(name.to_lowercase()),
            website_url: domain.map(|d| format!("https://{d}")),
            website_domain: domain.map(String::from),
        }
    }

    #[test]
    fn repeated_resolution_with_identical_payload_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let cand = candidate("Acme", Some("acme.com"));
        let key = IdentityKey::Domain("acme.com".into());
        let id1 = store.find_or_create_company(&key, &cand).unwrap();
        let id2 = store.find_or_create_company(&key, &cand).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.list_all_companies().unwrap().len(), 1);
    }

    #[test]
    fn enrichment_never_clobbers_existing_non_null_value() {
        let store = Store::open_in_memory().unwrap();
        let key = IdentityKey::Domain("acme.com".into());
        store.find_or_create_company(&key, &candidate("Acme Original", Some("acme.com"))).unwrap();

        let mut later = candidate("Acme Original", Some("acme.com"));
        later.name = None;
        later.raw_name = None;
        let id = store.find_or_create_company(&key, &later).unwrap();

        let company = store.get_company_by_id(id).unwrap().unwrap();
        assert_eq!(company.display_name.as_deref(), Some("Acme Original"));
    }

    #[test]
    fn aggregation_update_preserves_resolution() {
        let store = Store::open_in_memory().unwrap();
        let key = IdentityKey::Domain("acme.com".into());
        let id = store.find_or_create_company(&key, &candidate("Acme", Some("acme.com"))).unwrap();
        store.update_company_resolution(id, Resolution::Accepted).unwrap();

        store
            .update_company_aggregation(
                id,
                &AggregationUpdate { max_score: 7, offer_count: 2, unique_offer_count: 1, ..Default::default() },
            )
            .unwrap();

        let company = store.get_company_by_id(id).unwrap().unwrap();
        assert_eq!(company.resolution, Resolution::Accepted);
        assert_eq!(company.max_score, 7);
    }
}
