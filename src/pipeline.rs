// ── Batch Pipeline (C6) ──────────────────────────────────────────────────
// Drives one provider's batch of offer payloads through C4
// (persistence), C5 (aggregation over the affected set), and the scoring
// seam, inside one run (C7).

use crate::atoms::error::JobSyncResult;
use crate::atoms::types::{ProviderTag, RawOffer};
use crate::persistence::{self, PersistOutcome};
use crate::scoring::Matcher;
use crate::store::runs::RunCounters;
use crate::store::Store;
use chrono::Utc;
use std::collections::HashSet;

pub struct PipelineSummary {
    pub run_id: i64,
    pub status: String,
    pub counters: RunCounters,
}

/// Processes `offers` for `provider` under `query_fingerprint`, returning
/// a summary that the scheduler (C9) logs exactly once per run.
pub fn run_batch(
    store: &Store,
    matcher: &dyn Matcher,
    provider: ProviderTag,
    query_fingerprint: &str,
    offers: &[RawOffer],
    resolved_company_id: Option<i64>,
    pages_fetched: i64,
) -> JobSyncResult<PipelineSummary> {
    let run_id = store.create_run(provider.as_str(), query_fingerprint, Utc::now())?;
    let mut counters = RunCounters { pages_fetched, offers_fetched: offers.len() as i64, ..Default::default() };
    let mut affected_companies: HashSet<i64> = HashSet::new();

    for offer in offers {
        let outcome = persistence::persist_offer(store, provider, offer, resolved_company_id);
        match outcome {
            PersistOutcome::Ok { offer_id, company_id } => {
                counters.offers_upserted += 1;
                affected_companies.insert(company_id);
                score_and_store_match(store, matcher, offer_id, offer);
            }
            PersistOutcome::RepostDuplicate { company_id, .. } => {
                counters.offers_duplicates += 1;
                affected_companies.insert(company_id);
            }
            PersistOutcome::MissingDescription | PersistOutcome::CompanyResolved { .. } => {
                counters.offers_skipped += 1;
                if let PersistOutcome::CompanyResolved { company_id } = outcome {
                    affected_companies.insert(company_id);
                }
            }
            PersistOutcome::CompanyUnidentifiable => {
                counters.offers_skipped += 1;
            }
            PersistOutcome::DbError { company_id } => {
                counters.offers_failed += 1;
                counters.error_count += 1;
                if let Some(id) = company_id {
                    affected_companies.insert(id);
                }
            }
        }
    }

    let affected: Vec<i64> = affected_companies.into_iter().collect();
    let aggregation = crate::aggregator::aggregate_many(store, &affected);
    counters.companies_aggregated = aggregation.ok_count as i64;
    counters.companies_failed = aggregation.failed_count as i64;

    let status = if counters.offers_failed > 0 && counters.offers_upserted == 0 && counters.offers_duplicates == 0 {
        "failure"
    } else {
        "success"
    };
    store.finish_run(run_id, status, Utc::now(), &counters)?;

    log::info!(
        "[pipeline] run {run_id} provider={} fetched={} upserted={} duplicates={} skipped={} failed={} companies_aggregated={} companies_failed={}",
        provider,
        counters.offers_fetched,
        counters.offers_upserted,
        counters.offers_duplicates,
        counters.offers_skipped,
        counters.offers_failed,
        counters.companies_aggregated,
        counters.companies_failed,
    );

    Ok(PipelineSummary { run_id, status: status.to_string(), counters })
}

/// Scores a freshly-upserted canonical offer and writes its match row.
/// Scoring failures are logged and skipped, never fail the batch.
fn score_and_store_match(store: &Store, matcher: &dyn Matcher, offer_id: i64, offer: &RawOffer) {
    let Some(description) = offer.description.as_deref().filter(|d| !d.trim().is_empty()) else { return };
    let requirements = offer.requirements_text();
    match matcher.score(&offer.title, description, requirements.as_deref()) {
        Some(result) => {
            if let Err(err) = store.upsert_match(offer_id, result.score, &result.detail, result.category_id.as_deref()) {
                log::error!("[pipeline] failed to persist match for offer {offer_id}: {err}");
            }
        }
        None => log::debug!("[pipeline] matcher returned no result for offer {offer_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{CompanyPayload, OfferRef};
    use crate::scoring::KeywordMatcher;

    fn offer(id: &str, title: &str, description: Option<&str>) -> RawOffer {
        RawOffer {
            reference: OfferRef { provider: ProviderTag::Infojobs, provider_offer_id: id.into(), url: None },
            title: title.into(),
            company: CompanyPayload {
                name: Some("Acme".into()),
                normalized_name: Some("acme".into()),
                website_url: None,
                website_domain: Some("acme.com".into()),
            },
            description: description.map(String::from),
            min_requirements: None,
            desired_requirements: None,
            requirements_snippet: None,
            published_at: None,
            updated_at: None,
            created_at: None,
            applications_count: None,
        }
    }

    #[test]
    fn batch_with_one_new_offer_scores_and_aggregates() {
        let store = Store::open_in_memory().unwrap();
        let matcher = KeywordMatcher;
        let offers = vec![offer("A1", "Backend Engineer", Some("We need Rust and Postgres experience."))];

        let summary = run_batch(&store, &matcher, ProviderTag::Infojobs, "infojobs:rust:h1", &offers, None, 1).unwrap();

        assert_eq!(summary.status, "success");
        assert_eq!(summary.counters.offers_upserted, 1);
        assert_eq!(summary.counters.companies_aggregated, 1);

        let company = store.list_all_companies().unwrap().into_iter().next().unwrap();
        assert_eq!(company.unique_offer_count, 1);
        assert!(company.max_score > 0);
    }

    #[test]
    fn unidentifiable_offer_is_skipped_not_failed() {
        let store = Store::open_in_memory().unwrap();
        let matcher = KeywordMatcher;
        let mut bad = offer("A1", "Title", Some("desc"));
        bad.company = CompanyPayload::default();

        let summary = run_batch(&store, &matcher, ProviderTag::Infojobs, "infojobs:rust:h1", &[bad], None, 1).unwrap();
        assert_eq!(summary.counters.offers_skipped, 1);
        assert_eq!(summary.counters.offers_failed, 0);
    }
}
