// ── Repost Detector (C3) ────────────────────────────────────────────────
// Pure (no I/O other than the candidate list passed in as input).
// Decides whether an incoming offer with a new (provider,
// provider_offer_id) duplicates an existing canonical offer for the
// same company.

use crate::text_norm::{normalize_basic, tokenize};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A stored canonical offer, as loaded by the store for comparison.
#[derive(Debug, Clone)]
pub struct CanonicalOfferCandidate {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    Fingerprint,
    ExactTitle,
    DescSimilarity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotDuplicateReason {
    NoCandidates,
    MissingDescription,
    DescBelowThreshold,
    TitleMismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepostOutcome {
    Duplicate { canonical_offer_id: i64, reason: DuplicateReason, similarity: Option<f64> },
    NotDuplicate { reason: NotDuplicateReason },
}

/// SHA-256 hex of `normalize(title) + "\n" + normalize(description)`.
/// Returns `None` when either side is absent or blank after
/// normalization — the fast path is then skipped entirely and the
/// caller falls back to the title/similarity comparison.
pub fn compute_fingerprint(title: &str, description: Option<&str>) -> Option<String> {
    let norm_title = normalize_basic(title);
    let norm_desc = description.map(normalize_basic).unwrap_or_default();
    if norm_title.is_empty() || norm_desc.is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(norm_title.as_bytes());
    hasher.update(b"\n");
    hasher.update(norm_desc.as_bytes());
    let digest = hasher.finalize();
    Some(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Jaccard similarity over the bag-of-tokens representation of two texts.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;
    let ta: HashSet<String> = tokenize(a).into_iter().collect();
    let tb: HashSet<String> = tokenize(b).into_iter().collect();
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Run the full two-stage pipeline.
///
/// `same_fingerprint_candidates` is the store's pre-filtered result of
/// "canonical offers of the same company with the same fingerprint" — the
/// detector itself performs no query, it just takes the first hit.
/// `all_candidates` is every canonical offer for the company, used by the
/// similarity fallback when the fast path misses.
pub fn detect(
    incoming_title: &str,
    incoming_description: Option<&str>,
    incoming_fingerprint: Option<&str>,
    same_fingerprint_candidates: &[CanonicalOfferCandidate],
    all_candidates: &[CanonicalOfferCandidate],
    similarity_threshold: f64,
) -> RepostOutcome {
    if incoming_fingerprint.is_some() {
        if let Some(hit) = same_fingerprint_candidates.first() {
            return RepostOutcome::Duplicate {
                canonical_offer_id: hit.id,
                reason: DuplicateReason::Fingerprint,
                similarity: None,
            };
        }
    }

    if all_candidates.is_empty() {
        return RepostOutcome::NotDuplicate { reason: NotDuplicateReason::NoCandidates };
    }

    let norm_incoming_title = normalize_basic(incoming_title);
    let title_matches: Vec<&CanonicalOfferCandidate> = all_candidates
        .iter()
        .filter(|c| normalize_basic(&c.title) == norm_incoming_title)
        .collect();

    if let Some(best) = title_matches.into_iter().max_by_key(|c| c.last_seen_at) {
        return RepostOutcome::Duplicate {
            canonical_offer_id: best.id,
            reason: DuplicateReason::ExactTitle,
            similarity: None,
        };
    }

    let Some(description) = incoming_description.filter(|d| !d.trim().is_empty()) else {
        return RepostOutcome::NotDuplicate { reason: NotDuplicateReason::MissingDescription };
    };

    let mut best: Option<(i64, f64)> = None;
    for candidate in all_candidates {
        let Some(candidate_desc) = candidate.description.as_deref() else { continue };
        let score = jaccard_similarity(description, candidate_desc);
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((candidate.id, score));
        }
    }

    match best {
        Some((canonical_offer_id, score)) if score >= similarity_threshold => RepostOutcome::Duplicate {
            canonical_offer_id,
            reason: DuplicateReason::DescSimilarity,
            similarity: Some(score),
        },
        Some(_) => RepostOutcome::NotDuplicate { reason: NotDuplicateReason::DescBelowThreshold },
        None => RepostOutcome::NotDuplicate { reason: NotDuplicateReason::TitleMismatch },
    }
}
