// ── Offer Persistence Orchestrator (C4) ─────────────────────────────────
// Single entry point; never raises for per-offer errors — every outcome
// is a tagged `PersistOutcome` variant. Composes C2 (identity) and C3
// (repost detection) with the store primitives.

use crate::atoms::error::JobSyncResult;
use crate::atoms::types::{ProviderTag, RawOffer, Resolution};
use crate::identity::resolve_key;
use crate::repost::{self, RepostOutcome};
use crate::store::offers::OfferUpsert;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// Inserted a new canonical offer, or overwrote fields on an
    /// existing offer row found by (provider, provider_offer_id).
    Ok { offer_id: i64, company_id: i64 },
    /// Fast-path or fallback repost match: no new row, canonical's
    /// counters bumped.
    RepostDuplicate { canonical_offer_id: i64, company_id: i64 },
    /// ATS offer arrived with no description.
    MissingDescription,
    /// C2 could not resolve a company identity for this payload.
    CompanyUnidentifiable,
    /// Company's resolution is in the resolved set; ingest skipped.
    CompanyResolved { company_id: i64 },
    /// Store operation failed after the company was already known.
    DbError { company_id: Option<i64> },
}

/// Persist one raw offer. `resolved_company_id` lets a caller that has
/// already resolved the company via `CompanySource` skip identity
/// resolution here; `None` runs identity resolution over the offer's
/// embedded company payload instead.
pub fn persist_offer(store: &Store, provider: ProviderTag, offer: &RawOffer, resolved_company_id: Option<i64>) -> PersistOutcome {
    if provider.is_ats() && offer.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
        return PersistOutcome::MissingDescription;
    }

    let company_id = match resolved_company_id {
        Some(id) => id,
        None => match resolve_key(&offer.company) {
            Ok(key) => {
                let candidate = crate::identity::EnrichmentCandidate::from_payload(&offer.company);
                match store.find_or_create_company(&key, &candidate) {
                    Ok(id) => id,
                    Err(_) => return PersistOutcome::DbError { company_id: None },
                }
            }
            Err(_) => return PersistOutcome::CompanyUnidentifiable,
        },
    };

    let company = match store.get_company_by_id(company_id) {
        Ok(Some(c)) => c,
        Ok(None) => return PersistOutcome::DbError { company_id: Some(company_id) },
        Err(_) => return PersistOutcome::DbError { company_id: Some(company_id) },
    };
    if company.resolution.is_resolved() {
        return PersistOutcome::CompanyResolved { company_id };
    }

    let last_seen_at = offer.effective_seen_at();

    match store.get_offer_by_provider_id(provider, &offer.reference.provider_offer_id) {
        Ok(Some(_existing)) => persist_overwrite(store, provider, offer, company_id, last_seen_at),
        Ok(None) => persist_new(store, provider, offer, company_id, last_seen_at),
        Err(_) => PersistOutcome::DbError { company_id: Some(company_id) },
    }
}

fn persist_overwrite(
    store: &Store,
    provider: ProviderTag,
    offer: &RawOffer,
    company_id: i64,
    last_seen_at: chrono::DateTime<chrono::Utc>,
) -> PersistOutcome {
    let fingerprint = repost::compute_fingerprint(&offer.title, offer.description.as_deref());
    let upsert = build_upsert(provider, offer, company_id, fingerprint, last_seen_at);
    match store.upsert_offer(&upsert) {
        Ok(offer_id) => PersistOutcome::Ok { offer_id, company_id },
        Err(_) => PersistOutcome::DbError { company_id: Some(company_id) },
    }
}

fn persist_new(
    store: &Store,
    provider: ProviderTag,
    offer: &RawOffer,
    company_id: i64,
    last_seen_at: chrono::DateTime<chrono::Utc>,
) -> PersistOutcome {
    let fingerprint = repost::compute_fingerprint(&offer.title, offer.description.as_deref());

    if let Some(fp) = fingerprint.as_deref() {
        let candidates = match store.find_canonical_offers_by_fingerprint(company_id, fp) {
            Ok(c) => c,
            Err(_) => return PersistOutcome::DbError { company_id: Some(company_id) },
        };
        if let Some(hit) = candidates.first() {
            return bump_repost(store, hit.id, company_id, last_seen_at);
        }
    }

    let all_candidates = match store.list_canonical_offers_for_repost(company_id) {
        Ok(c) => c,
        Err(_) => return PersistOutcome::DbError { company_id: Some(company_id) },
    };

    let outcome = repost::detect(
        &offer.title,
        offer.description.as_deref(),
        fingerprint.as_deref(),
        &[],
        &all_candidates,
        crate::atoms::constants::SIMILARITY_THRESHOLD,
    );

    match outcome {
        RepostOutcome::Duplicate { canonical_offer_id, .. } => bump_repost(store, canonical_offer_id, company_id, last_seen_at),
        RepostOutcome::NotDuplicate { .. } => {
            let upsert = build_upsert(provider, offer, company_id, fingerprint, last_seen_at);
            match store.upsert_offer(&upsert) {
                Ok(offer_id) => PersistOutcome::Ok { offer_id, company_id },
                Err(_) => PersistOutcome::DbError { company_id: Some(company_id) },
            }
        }
    }
}

fn bump_repost(store: &Store, canonical_offer_id: i64, company_id: i64, last_seen_at: chrono::DateTime<chrono::Utc>) -> PersistOutcome {
    match store.increment_offer_repost_count(canonical_offer_id, last_seen_at) {
        Ok(()) => PersistOutcome::RepostDuplicate { canonical_offer_id, company_id },
        Err(_) => PersistOutcome::DbError { company_id: Some(company_id) },
    }
}

fn build_upsert(
    provider: ProviderTag,
    offer: &RawOffer,
    company_id: i64,
    fingerprint: Option<String>,
    last_seen_at: chrono::DateTime<chrono::Utc>,
) -> OfferUpsert {
    OfferUpsert {
        provider,
        provider_offer_id: offer.reference.provider_offer_id.clone(),
        url: offer.reference.url.clone(),
        company_id,
        title: offer.title.clone(),
        description: offer.description.clone(),
        requirements: offer.requirements_text(),
        published_at: offer.published_at,
        updated_at: offer.updated_at,
        created_at: offer.created_at,
        content_fingerprint: fingerprint,
        last_seen_at,
    }
}

/// Convenience used by the sheet/feedback layers: does `company_id`
/// currently sit in the resolved set?
pub fn is_resolved(store: &Store, company_id: i64) -> JobSyncResult<bool> {
    Ok(store.get_company_by_id(company_id)?.map(|c| c.resolution.is_resolved()).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{CompanyPayload, OfferRef};

    fn offer(provider_offer_id: &str, title: &str, description: Option<&str>) -> RawOffer {
        RawOffer {
            reference: OfferRef { provider: ProviderTag::Infojobs, provider_offer_id: provider_offer_id.into(), url: None },
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
    fn same_offer_ingested_twice_yields_one_row() {
        let store = Store::open_in_memory().unwrap();
        let o = offer("A", "Backend Engineer", Some("Node.js role."));

        let first = persist_offer(&store, ProviderTag::Infojobs, &o, None);
        let second = persist_offer(&store, ProviderTag::Infojobs, &o, None);

        match (first, second) {
            (PersistOutcome::Ok { offer_id: id1, company_id: c1 }, PersistOutcome::Ok { offer_id: id2, company_id: c2 }) => {
                assert_eq!(id1, id2);
                assert_eq!(c1, c2);
            }
            other => panic!("expected Ok/Ok, got {:?}", other),
        }
    }

    #[test]
    fn content_duplicate_across_ids_bumps_repost_count_without_new_row() {
        let store = Store::open_in_memory().unwrap();
        let o1 = offer("A1", "Backend Engineer", Some("Node.js role, remote."));
        let o2 = offer("A2", "Backend Engineer", Some("Node.js role, remote."));

        let first = persist_offer(&store, ProviderTag::Infojobs, &o1, None);
        let second = persist_offer(&store, ProviderTag::Infojobs, &o2, None);

        let company_id = match first {
            PersistOutcome::Ok { company_id, .. } => company_id,
            other => panic!("expected Ok, got {:?}", other),
        };
        match second {
            PersistOutcome::RepostDuplicate { company_id: c2, .. } => assert_eq!(c2, company_id),
            other => panic!("expected RepostDuplicate, got {:?}", other),
        }

        let canonicals = store.list_canonical_offers_for_repost(company_id).unwrap();
        assert_eq!(canonicals.len(), 1);
        assert_eq!(canonicals[0].id, {
            let o = store.get_offer_by_provider_id(ProviderTag::Infojobs, "A1").unwrap().unwrap();
            o.id
        });
    }

    #[test]
    fn unidentifiable_company_is_skipped() {
        let store = Store::open_in_memory().unwrap();
        let mut o = offer("A", "Backend Engineer", Some("desc"));
        o.company = CompanyPayload::default();

        let outcome = persist_offer(&store, ProviderTag::Infojobs, &o, None);
        assert_eq!(outcome, PersistOutcome::CompanyUnidentifiable);
    }

    #[test]
    fn resolved_company_blocks_new_offer_without_touching_existing() {
        let store = Store::open_in_memory().unwrap();
        let o1 = offer("A1", "Backend Engineer", Some("desc one"));
        let first = persist_offer(&store, ProviderTag::Infojobs, &o1, None);
        let company_id = match first {
            PersistOutcome::Ok { company_id, .. } => company_id,
            other => panic!("expected Ok, got {:?}", other),
        };
        store.update_company_resolution(company_id, Resolution::Accepted).unwrap();

        let o2 = offer("A2", "Frontend Engineer", Some("desc two"));
        let second = persist_offer(&store, ProviderTag::Infojobs, &o2, None);
        assert_eq!(second, PersistOutcome::CompanyResolved { company_id });

        assert!(store.get_offer_by_provider_id(ProviderTag::Infojobs, "A2").unwrap().is_none());
        assert!(store.get_offer_by_provider_id(ProviderTag::Infojobs, "A1").unwrap().is_some());
    }

    #[test]
    fn ats_offer_without_description_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let o = offer("G1", "Backend Engineer", None);
        let outcome = persist_offer(&store, ProviderTag::Greenhouse, &o, Some(1));
        assert_eq!(outcome, PersistOutcome::MissingDescription);
    }
}
