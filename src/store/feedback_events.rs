// ── Store: Company Feedback Events Repository ───────────────────────────
// A supplementary audit table: every resolution change the feedback
// loop (C10) applies gets one row here, so a destructive
// `delete_offers_for_company` call is always reconstructable after the
// fact from `resolution` + `offers_deleted`.

use super::Store;
use crate::atoms::error::JobSyncResult;
use crate::atoms::types::Resolution;
use rusqlite::params;

#[derive(Debug, Clone)]
pub struct FeedbackEvent {
    pub id: i64,
    pub company_id: i64,
    pub from_resolution: String,
    pub to_resolution: String,
    pub category: String,
    pub offers_deleted: i64,
    pub applied_at: String,
}

impl Store {
    pub fn record_feedback_event(
        &self,
        company_id: i64,
        from: Resolution,
        to: Resolution,
        category: &str,
        offers_deleted: i64,
    ) -> JobSyncResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO company_feedback_events (company_id, from_resolution, to_resolution, category, offers_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![company_id, from.as_str(), to.as_str(), category, offers_deleted],
        )?;
        Ok(())
    }

    pub fn list_feedback_events_for_company(&self, company_id: i64) -> JobSyncResult<Vec<FeedbackEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, company_id, from_resolution, to_resolution, category, offers_deleted, applied_at
             FROM company_feedback_events WHERE company_id = ?1 ORDER BY applied_at DESC",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok(FeedbackEvent {
                id: row.get(0)?,
                company_id: row.get(1)?,
                from_resolution: row.get(2)?,
                to_resolution: row.get(3)?,
                category: row.get(4)?,
                offers_deleted: row.get(5)?,
                applied_at: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::CompanyPayload;
    use crate::identity::{resolve_key, EnrichmentCandidate};

    #[test]
    fn events_accumulate_in_reverse_chronological_order() {
        let store = Store::open_in_memory().unwrap();
        let payload = CompanyPayload {
            name: Some("Acme".into()),
            normalized_name: None,
            website_url: Some("https://acme.com".into()),
            website_domain: Some("acme.com".into()),
        };
        let key = resolve_key(&payload).unwrap();
        let company_id = store.find_or_create_company(&key, &EnrichmentCandidate::from_payload(&payload)).unwrap();

        store.record_feedback_event(company_id, Resolution::Pending, Resolution::HighInterest, "backend", 0).unwrap();
        store.record_feedback_event(company_id, Resolution::HighInterest, Resolution::Rejected, "backend", 3).unwrap();

        let events = store.list_feedback_events_for_company(company_id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].to_resolution, "REJECTED");
        assert_eq!(events[0].offers_deleted, 3);
    }
}
