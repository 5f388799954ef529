// ── Feedback Loop (C10) ──────────────────────────────────────────────────
// A read-only analysis stage followed by a controlled write stage, both
// gated by the Europe/Madrid 03:00–06:00 window.

use crate::atoms::constants::{FEEDBACK_TIMEZONE, FEEDBACK_WINDOW_END_HOUR, FEEDBACK_WINDOW_START_HOUR};
use crate::atoms::error::JobSyncResult;
use crate::atoms::types::Resolution;
use crate::sheet::SheetTransport;
use crate::store::Store;
use chrono::{DateTime, Timelike, Utc};

/// Checked at both the orchestration level and here, so a cycle that
/// straddles the window boundary can't slip a write past it.
pub fn is_window_open(now_utc: DateTime<Utc>) -> bool {
    let Ok(tz) = FEEDBACK_TIMEZONE.parse::<chrono_tz::Tz>() else { return false };
    let local = now_utc.with_timezone(&tz);
    let hour = local.hour();
    hour >= FEEDBACK_WINDOW_START_HOUR && hour < FEEDBACK_WINDOW_END_HOUR
}

#[derive(Debug, Clone, Default)]
pub struct ReadOutcome {
    pub entries: Vec<(i64, Resolution)>,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub duplicate_rows: usize,
}

/// Parses only columns A (company id) and C (resolution) from the sheet's
/// data rows, defensively: empty rows are skipped, invalid ids/
/// resolutions are counted and skipped, duplicate ids keep the first
/// occurrence.
pub fn parse_sheet_rows(rows: &[Vec<String>]) -> ReadOutcome {
    let mut outcome = ReadOutcome::default();
    let mut seen = std::collections::HashSet::new();

    for row in rows.iter().skip(1) {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        outcome.total_rows += 1;

        let Some(id) = row.first().and_then(|v| v.trim().parse::<i64>().ok()).filter(|id| *id > 0) else {
            outcome.invalid_rows += 1;
            continue;
        };
        let Some(resolution) = row.get(2).and_then(|v| Resolution::parse(v.trim())) else {
            outcome.invalid_rows += 1;
            continue;
        };

        if !seen.insert(id) {
            outcome.duplicate_rows += 1;
            continue;
        }
        outcome.valid_rows += 1;
        outcome.entries.push((id, resolution));
    }

    outcome
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCategory {
    Destructive,
    Reversal,
    Informational,
}

#[derive(Debug, Clone)]
pub struct ResolutionChange {
    pub company_id: i64,
    pub from: Resolution,
    pub to: Resolution,
    pub category: ChangeCategory,
}

fn classify(from: Resolution, to: Resolution) -> ChangeCategory {
    match (from.is_resolved(), to.is_resolved()) {
        (false, true) => ChangeCategory::Destructive,
        (true, false) => ChangeCategory::Reversal,
        _ => ChangeCategory::Informational,
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompareOutcome {
    pub changes: Vec<ResolutionChange>,
    pub unchanged: usize,
    pub unknown_ids: usize,
}

/// Compares sheet-reported resolutions against the store's current
/// values; changes sorted by company id ascending for determinism.
pub fn compare(store: &Store, sheet_entries: &[(i64, Resolution)]) -> JobSyncResult<CompareOutcome> {
    let mut outcome = CompareOutcome::default();
    for &(company_id, to) in sheet_entries {
        match store.get_company_by_id(company_id)? {
            None => {
                outcome.unknown_ids += 1;
                log::warn!("[feedback] sheet references unknown company id {company_id}");
            }
            Some(company) if company.resolution == to => outcome.unchanged += 1,
            Some(company) => outcome.changes.push(ResolutionChange { company_id, from: company.resolution, to, category: classify(company.resolution, to) }),
        }
    }
    outcome.changes.sort_by_key(|c| c.company_id);
    Ok(outcome)
}

#[derive(Debug, Clone, Default)]
pub struct ApplyCounters {
    pub attempted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deletions_attempted: usize,
    pub offers_deleted: usize,
    pub deletions_failed: usize,
}

/// Applies every change: resolution update first, then (for destructive
/// changes) offer deletion. Updating before deleting per company id
/// keeps the resolution column consistent even if the deletion itself
/// fails partway; across companies there is no required order.
pub fn apply(store: &Store, changes: &[ResolutionChange]) -> ApplyCounters {
    let mut counters = ApplyCounters::default();

    for change in changes {
        counters.attempted += 1;
        match store.update_company_resolution(change.company_id, change.to) {
            Ok(()) => counters.updated += 1,
            Err(err) => {
                log::error!("[feedback] failed to update resolution for company {}: {err}", change.company_id);
                counters.failed += 1;
                continue;
            }
        }

        if change.category == ChangeCategory::Destructive {
            counters.deletions_attempted += 1;
            match store.delete_offers_for_company(change.company_id) {
                Ok(deleted) => {
                    counters.offers_deleted += deleted;
                    if let Err(err) =
                        store.record_feedback_event(change.company_id, change.from, change.to, "destructive", deleted as i64)
                    {
                        log::error!("[feedback] failed to record audit event for company {}: {err}", change.company_id);
                    }
                }
                Err(err) => {
                    log::error!("[feedback] failed to delete offers for company {}: {err}", change.company_id);
                    counters.deletions_failed += 1;
                }
            }
        } else if let Err(err) = store.record_feedback_event(change.company_id, change.from, change.to, category_label(change.category), 0) {
            log::error!("[feedback] failed to record audit event for company {}: {err}", change.company_id);
        }
    }

    counters
}

fn category_label(category: ChangeCategory) -> &'static str {
    match category {
        ChangeCategory::Destructive => "destructive",
        ChangeCategory::Reversal => "reversal",
        ChangeCategory::Informational => "informational",
    }
}

pub struct FeedbackOutcome {
    pub skipped: bool,
    pub reason: Option<String>,
    pub read: Option<ReadOutcome>,
    pub compare: Option<CompareOutcome>,
    pub apply: Option<ApplyCounters>,
}

/// Full C10 cycle: window gate, read, compare, classify, apply. Exactly
/// one structured audit log line is emitted at the end.
pub async fn process_feedback(store: &Store, transport: &dyn SheetTransport, range: &str, now_utc: DateTime<Utc>) -> JobSyncResult<FeedbackOutcome> {
    if !is_window_open(now_utc) {
        log::info!("[feedback] window closed at {now_utc}, skipping");
        return Ok(FeedbackOutcome { skipped: true, reason: Some("window_closed".to_string()), read: None, compare: None, apply: None });
    }

    let rows = transport.read_values(range).await?;
    let read = parse_sheet_rows(&rows);
    let compare_outcome = compare(store, &read.entries)?;
    let apply_counters = apply(store, &compare_outcome.changes);

    log::info!(
        "[feedback] audit window_open=true total_rows={} valid_rows={} invalid_rows={} duplicate_rows={} changes={} unchanged={} unknown_ids={} updated={} update_failed={} deletions_attempted={} offers_deleted={} deletions_failed={}",
        read.total_rows,
        read.valid_rows,
        read.invalid_rows,
        read.duplicate_rows,
        compare_outcome.changes.len(),
        compare_outcome.unchanged,
        compare_outcome.unknown_ids,
        apply_counters.updated,
        apply_counters.failed,
        apply_counters.deletions_attempted,
        apply_counters.offers_deleted,
        apply_counters.deletions_failed,
    );

    Ok(FeedbackOutcome { skipped: false, reason: None, read: Some(read), compare: Some(compare_outcome), apply: Some(apply_counters) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_is_open_at_four_am_madrid() {
        // 2026-03-10 04:00 Madrid (CET, UTC+1) = 03:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 3, 0, 0).unwrap();
        assert!(is_window_open(now));
    }

    #[test]
    fn window_is_closed_at_noon_utc() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert!(!is_window_open(now));
    }

    #[test]
    fn parse_rows_skips_blank_and_invalid_and_dedupes() {
        let rows = vec![
            vec!["ID".into(), "Name".into(), "Resolution".into()],
            vec!["1".into(), "Acme".into(), "ACCEPTED".into()],
            vec!["".into(), "".into(), "".into()],
            vec!["not-a-number".into(), "X".into(), "PENDING".into()],
            vec!["2".into(), "Y".into(), "NOT_A_RESOLUTION".into()],
            vec!["1".into(), "Acme Dup".into(), "REJECTED".into()],
        ];
        let outcome = parse_sheet_rows(&rows);
        assert_eq!(outcome.valid_rows, 1);
        assert_eq!(outcome.invalid_rows, 2);
        assert_eq!(outcome.duplicate_rows, 1);
        assert_eq!(outcome.entries, vec![(1, Resolution::Accepted)]);
    }

    #[test]
    fn classify_active_to_resolved_is_destructive() {
        assert_eq!(classify(Resolution::Pending, Resolution::Accepted), ChangeCategory::Destructive);
        assert_eq!(classify(Resolution::Accepted, Resolution::Pending), ChangeCategory::Reversal);
        assert_eq!(classify(Resolution::Pending, Resolution::InProgress), ChangeCategory::Informational);
        assert_eq!(classify(Resolution::Accepted, Resolution::Rejected), ChangeCategory::Informational);
    }

    #[test]
    fn apply_destructive_change_deletes_offers_and_updates_resolution() {
        let store = Store::open_in_memory().unwrap();
        let payload = crate::atoms::types::CompanyPayload {
            name: Some("Acme".into()),
            normalized_name: None,
            website_url: Some("https://acme.com".into()),
            website_domain: Some("acme.com".into()),
        };
        let key = crate::identity::resolve_key(&payload).unwrap();
        let company_id = store.find_or_create_company(&key, &crate::identity::EnrichmentCandidate::from_payload(&payload)).unwrap();

        store
            .upsert_offer(&crate::store::offers::OfferUpsert {
                provider: crate::atoms::types::ProviderTag::Infojobs,
                provider_offer_id: "A1".into(),
                url: None,
                company_id,
                title: "Backend Engineer".into(),
                description: Some("desc".into()),
                requirements: None,
                published_at: None,
                updated_at: None,
                created_at: None,
                content_fingerprint: Some("fp".into()),
                last_seen_at: Utc::now(),
            })
            .unwrap();

        let change = ResolutionChange { company_id, from: Resolution::Pending, to: Resolution::Accepted, category: ChangeCategory::Destructive };
        let counters = apply(&store, &[change]);

        assert_eq!(counters.updated, 1);
        assert_eq!(counters.offers_deleted, 1);
        let company = store.get_company_by_id(company_id).unwrap().unwrap();
        assert_eq!(company.resolution, Resolution::Accepted);
        assert!(store.list_canonical_offers_for_repost(company_id).unwrap().is_empty());
    }
}
