// ── Matcher/Scorer Boundary ──────────────────────────────────────────────
// The catalog compiler and scoring arithmetic proper are an external
// collaborator's concern; this module supplies the seam (`Matcher`) C6
// calls through, plus one concrete, honestly-small reference
// implementation so the pipeline is exercisable end-to-end.

use crate::atoms::constants::STRONG_SCORE_THRESHOLD;
use crate::text_norm::normalize_basic;

/// A scored match against one offer's text. `score` is 0–10 inclusive.
/// `category_id` identifies the best matching category, if any matched
/// at all.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub score: i64,
    pub category_id: Option<String>,
    pub detail: String,
}

impl MatchResult {
    pub fn is_strong(&self) -> bool {
        self.score >= STRONG_SCORE_THRESHOLD
    }
}

/// What C6 calls per offer to produce a `Match` row. Scoring failures are
/// logged and skipped by the caller, never fail the batch.
pub trait Matcher: Send + Sync {
    fn score(&self, title: &str, description: &str, requirements: Option<&str>) -> Option<MatchResult>;
}

#[derive(Debug, Clone)]
struct Category {
    id: &'static str,
    phrases: &'static [&'static str],
}

/// A small built-in catalog. Each phrase hit in title/description/
/// requirements contributes one point to its category, capped at 10.
/// This is deliberately a fixed, in-crate reference list, not compiled
/// from an external source.
const CATALOG: &[Category] = &[
    Category {
        id: "backend",
        phrases: &["rust", "golang", "backend", "microservice", "distributed system", "api", "postgres", "kafka"],
    },
    Category {
        id: "frontend",
        phrases: &["react", "typescript", "frontend", "css", "accessibility", "next.js"],
    },
    Category {
        id: "data",
        phrases: &["data pipeline", "etl", "spark", "airflow", "machine learning", "data engineer"],
    },
    Category {
        id: "security",
        phrases: &["security", "penetration testing", "cryptograph", "vulnerability", "threat model"],
    },
    Category {
        id: "infra",
        phrases: &["kubernetes", "terraform", "infrastructure", "sre", "observability", "on-call"],
    },
];

/// Substring/phrase counting against `CATALOG`, scaled into 0–10. Picks
/// the category with the most phrase hits; ties broken by catalog order.
pub struct KeywordMatcher;

impl Matcher for KeywordMatcher {
    fn score(&self, title: &str, description: &str, requirements: Option<&str>) -> Option<MatchResult> {
        let haystack = normalize_basic(&format!("{title}\n{description}\n{}", requirements.unwrap_or_default()));
        if haystack.trim().is_empty() {
            return None;
        }

        let mut best: Option<(&Category, usize)> = None;
        for category in CATALOG {
            let hits = category.phrases.iter().filter(|phrase| haystack.contains(*phrase)).count();
            if hits == 0 {
                continue;
            }
            if best.map_or(true, |(_, b)| hits > b) {
                best = Some((category, hits));
            }
        }

        let Some((category, hits)) = best else {
            return Some(MatchResult { score: 0, category_id: None, detail: "{}".to_string() });
        };

        let score = (hits as i64 * 2).min(10);
        Some(MatchResult {
            score,
            category_id: Some(category.id.to_string()),
            detail: format!(r#"{{"category":"{}","hits":{}}}"#, category.id, hits),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_heavy_description_scores_and_categorizes_as_backend() {
        let matcher = KeywordMatcher;
        let result = matcher
            .score("Backend Engineer", "We build Rust microservices on Postgres and Kafka", None)
            .unwrap();
        assert_eq!(result.category_id.as_deref(), Some("backend"));
        assert!(result.is_strong());
    }

    #[test]
    fn no_phrase_hits_yields_zero_score_no_category() {
        let matcher = KeywordMatcher;
        let result = matcher.score("Office Manager", "Coordinate team lunches and travel", None).unwrap();
        assert_eq!(result.score, 0);
        assert!(result.category_id.is_none());
    }

    #[test]
    fn empty_text_yields_none() {
        let matcher = KeywordMatcher;
        assert!(matcher.score("", "", None).is_none());
    }

    #[test]
    fn score_is_clamped_to_ten() {
        let matcher = KeywordMatcher;
        let desc = "rust golang backend microservice distributed system api postgres kafka rust rust";
        let result = matcher.score("Senior Rust Engineer", desc, None).unwrap();
        assert_eq!(result.score, 10);
    }
}
