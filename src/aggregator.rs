// ── Aggregator (C5) ──────────────────────────────────────────────────────
// Pure arithmetic over a loaded snapshot of one company's canonical
// offers + their matches — the store round-trip and retry/chunking live
// in `aggregator::aggregate_many`, which is the only I/O-bearing part of
// this module.

use crate::atoms::constants::{AGGREGATION_CHUNK_SIZE, AGGREGATION_MAX_RETRIES, AGGREGATION_RETRY_BACKOFF_MS, STRONG_SCORE_THRESHOLD};
use crate::store::companies::AggregationUpdate;
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::thread;
use std::time::Duration;

/// One canonical offer's aggregation-relevant facts, as loaded from the
/// store (join of `offers` + `matches`).
#[derive(Debug, Clone)]
pub struct CanonicalOfferFacts {
    pub offer_id: i64,
    pub repost_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub score: Option<i64>,
    pub category_id: Option<String>,
}

/// Pure recomputation of a company's aggregation fields from its current
/// canonical offer set. Never touches resolution or
/// identity columns — the caller persists this via
/// `update_company_aggregation`, which enforces that partial-write
/// guarantee at the SQL layer (G-AGG).
pub fn recompute(offers: &[CanonicalOfferFacts]) -> AggregationUpdate {
    let offer_count: i64 = offers.iter().map(|o| 1 + o.repost_count).sum();
    let unique_offer_count = offers.len() as i64;

    let max_score = offers.iter().filter_map(|o| o.score).max().unwrap_or(0);

    // top_offer_id: canonical with max score, ties broken by newest
    // published_at, then lowest id.
    let top = offers.iter().filter(|o| o.score == Some(max_score)).min_by(|a, b| {
        b.published_at.cmp(&a.published_at).then(a.offer_id.cmp(&b.offer_id))
    });
    let top_offer_id = if max_score > 0 { top.map(|o| o.offer_id) } else { None };
    let top_category_id = top.and_then(|o| o.category_id.clone());

    let strong: Vec<&CanonicalOfferFacts> = offers.iter().filter(|o| o.score.unwrap_or(0) >= STRONG_SCORE_THRESHOLD).collect();
    let strong_offer_count = strong.len() as i64;
    let avg_strong_score = if strong.is_empty() {
        None
    } else {
        Some(strong.iter().filter_map(|o| o.score).sum::<i64>() as f64 / strong.len() as f64)
    };
    let last_strong_at = strong.iter().filter_map(|o| o.published_at).max();

    let mut category_max: BTreeMap<String, i64> = BTreeMap::new();
    for offer in offers {
        let (Some(category), Some(score)) = (&offer.category_id, offer.score) else { continue };
        category_max
            .entry(category.clone())
            .and_modify(|m| *m = (*m).max(score))
            .or_insert(score);
    }
    let category_max_scores = serde_json::to_string(&category_max).unwrap_or_else(|_| "{}".to_string());

    AggregationUpdate {
        max_score,
        offer_count,
        unique_offer_count,
        strong_offer_count,
        avg_strong_score,
        top_category_id,
        top_offer_id,
        category_max_scores,
        last_strong_at: last_strong_at.map(|d| d.to_rfc3339()),
    }
}

pub struct AggregateManyOutcome {
    pub ok_count: usize,
    pub failed_count: usize,
}

/// Loads + recomputes + persists aggregation for each of `company_ids`
/// (deduplicated), chunked at `AGGREGATION_CHUNK_SIZE`, up to
/// `1 + AGGREGATION_MAX_RETRIES` attempts per company with a fixed
/// backoff between retries. Never raises — logs and continues on final
/// failure.
pub fn aggregate_many(store: &Store, company_ids: &[i64]) -> AggregateManyOutcome {
    let mut seen = HashSet::new();
    let deduped: Vec<i64> = company_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    let mut ok_count = 0;
    let mut failed_count = 0;

    for chunk in deduped.chunks(AGGREGATION_CHUNK_SIZE) {
        for &company_id in chunk {
            let mut attempt = 0;
            loop {
                match aggregate_one(store, company_id) {
                    Ok(()) => {
                        ok_count += 1;
                        break;
                    }
                    Err(err) => {
                        attempt += 1;
                        if attempt > AGGREGATION_MAX_RETRIES {
                            log::error!("[aggregator] giving up on company {company_id} after {attempt} attempts: {err}");
                            failed_count += 1;
                            break;
                        }
                        log::warn!("[aggregator] retrying company {company_id} (attempt {attempt}): {err}");
                        thread::sleep(Duration::from_millis(AGGREGATION_RETRY_BACKOFF_MS));
                    }
                }
            }
        }
    }

    AggregateManyOutcome { ok_count, failed_count }
}

fn aggregate_one(store: &Store, company_id: i64) -> crate::atoms::error::JobSyncResult<()> {
    let offers = store.load_canonical_offer_facts(company_id)?;
    let update = recompute(&offers);
    store.update_company_aggregation(company_id, &update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: i64, repost_count: i64, score: Option<i64>, category: Option<&str>, hours_ago: i64) -> CanonicalOfferFacts {
        CanonicalOfferFacts {
            offer_id: id,
            repost_count,
            published_at: Some(Utc::now() - chrono::Duration::hours(hours_ago)),
            score,
            category_id: category.map(String::from),
        }
    }

    #[test]
    fn empty_set_recomputes_to_zeroes() {
        let update = recompute(&[]);
        assert_eq!(update.offer_count, 0);
        assert_eq!(update.unique_offer_count, 0);
        assert_eq!(update.max_score, 0);
        assert!(update.top_offer_id.is_none());
        assert!(update.avg_strong_score.is_none());
    }

    #[test]
    fn offer_count_includes_reposts_unique_count_does_not() {
        let offers = vec![offer(1, 2, Some(5), Some("backend"), 3), offer(2, 0, Some(3), Some("frontend"), 1)];
        let update = recompute(&offers);
        assert_eq!(update.unique_offer_count, 2);
        assert_eq!(update.offer_count, 5); // (1+2) + (1+0)
    }

    #[test]
    fn top_offer_ties_broken_by_newest_then_lowest_id() {
        let offers = vec![
            offer(5, 0, Some(8), Some("backend"), 10),
            offer(2, 0, Some(8), Some("frontend"), 1), // newer, should win
            offer(9, 0, Some(8), Some("data"), 1),     // same age as 2, higher id loses
        ];
        let update = recompute(&offers);
        assert_eq!(update.top_offer_id, Some(2));
        assert_eq!(update.top_category_id.as_deref(), Some("frontend"));
    }

    #[test]
    fn strong_offers_use_threshold_of_six() {
        let offers = vec![offer(1, 0, Some(6), Some("backend"), 1), offer(2, 0, Some(5), Some("backend"), 1)];
        let update = recompute(&offers);
        assert_eq!(update.strong_offer_count, 1);
        assert_eq!(update.avg_strong_score, Some(6.0));
    }

    #[test]
    fn category_max_scores_takes_the_max_per_category() {
        let offers = vec![
            offer(1, 0, Some(4), Some("backend"), 1),
            offer(2, 0, Some(9), Some("backend"), 1),
            offer(3, 0, Some(2), Some("frontend"), 1),
        ];
        let update = recompute(&offers);
        assert!(update.category_max_scores.contains("\"backend\":9"));
        assert!(update.category_max_scores.contains("\"frontend\":2"));
    }

    #[test]
    fn zero_score_offers_never_become_top_offer() {
        let offers = vec![offer(1, 0, Some(0), None, 1), offer(2, 0, None, None, 1)];
        let update = recompute(&offers);
        assert_eq!(update.max_score, 0);
        assert!(update.top_offer_id.is_none());
    }
}
