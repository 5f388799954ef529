// ── Identity Resolver (C2) ──────────────────────────────────────────────
// Pure planning: decide *what* the store should do to resolve a company
// payload to a stable internal id. Does no I/O itself — `store::companies`
// executes the plan.

use crate::atoms::types::CompanyPayload;
use crate::text_norm::normalize_company_name;

/// The key the resolver decided to use, and the plan the store should
/// execute: a select-by-key, enrich-or-insert lookup. Never clobbers a
/// non-null stored column with a null incoming value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKey {
    Domain(String),
    NormalizedName(String),
}

/// Why identity resolution failed. Surfaces as `company_unidentifiable`
/// at the offer-persistence layer — both failure modes collapse to the
/// same outcome since there's nothing finer-grained a caller could do
/// with the distinction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientIdentityEvidence;

/// Decide the identity key for a company payload.
/// Step 1: prefer `website_domain` as the strong key.
/// Step 2: else fall back to `normalized_name` (or derive one from `name`)
/// as the weak key.
/// Step 3: else fail.
pub fn resolve_key(payload: &CompanyPayload) -> Result<IdentityKey, InsufficientIdentityEvidence> {
    if let Some(domain) = normalize_domain(&payload.website_domain) {
        return Ok(IdentityKey::Domain(domain));
    }
    if let Some(name) = payload
        .normalized_name
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(normalize_company_name)
        .or_else(|| payload.name.as_deref().filter(|s| !s.trim().is_empty()).map(normalize_company_name))
    {
        if !name.is_empty() {
            return Ok(IdentityKey::NormalizedName(name));
        }
    }
    Err(InsufficientIdentityEvidence)
}

fn normalize_domain(domain: &Option<String>) -> Option<String> {
    let d = domain.as_deref()?.trim();
    if d.is_empty() {
        return None;
    }
    let lowered = d.to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let host_only = without_scheme.split('/').next().unwrap_or(without_scheme);
    let without_www = host_only.strip_prefix("www.").unwrap_or(host_only);
    if without_www.is_empty() {
        None
    } else {
        Some(without_www.to_string())
    }
}

/// Columns a newly-discovered company row may be enriched with, for the
/// "select-and-compare" enrichment discipline: only fields
/// that are currently null in the store are written, never overwritten.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentCandidate {
    pub name: Option<String>,
    pub raw_name: Option<String>,
    pub normalized_name: Option<String>,
    pub website_url: Option<String>,
    pub website_domain: Option<String>,
}

impl EnrichmentCandidate {
    pub fn from_payload(payload: &CompanyPayload) -> Self {
        EnrichmentCandidate {
            name: payload.name.clone(),
            raw_name: payload.name.clone(),
            normalized_name: payload
                .normalized_name
                .clone()
                .or_else(|| payload.name.as_deref().map(normalize_company_name)),
            website_url: payload.website_url.clone(),
            website_domain: normalize_domain(&payload.website_domain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(
        name: Option<&str>,
        normalized: Option<&str>,
        url: Option<&str>,
        domain: Option<&str>,
    ) -> CompanyPayload {
        CompanyPayload {
            name: name.map(String::from),
            normalized_name: normalized.map(String::from),
            website_url: url.map(String::from),
            website_domain: domain.map(String::from),
        }
    }

    #[test]
    fn domain_takes_priority_over_name() {
        let p = payload(Some("Acme"), Some("acme"), None, Some("https://www.acme.com/careers"));
        assert_eq!(resolve_key(&p).unwrap(), IdentityKey::Domain("acme.com".into()));
    }

    #[test]
    fn falls_back_to_normalized_name_without_domain() {
        let p = payload(Some("Acme Corp"), None, None, None);
        assert_eq!(resolve_key(&p).unwrap(), IdentityKey::NormalizedName("acme".into()));
    }

    #[test]
    fn fails_with_no_evidence_at_all() {
        let p = payload(None, None, None, None);
        assert!(resolve_key(&p).is_err());
    }

    #[test]
    fn domain_normalization_strips_scheme_and_www_and_path() {
        let p = payload(None, None, None, Some("HTTP://WWW.Example.COM/jobs"));
        assert_eq!(resolve_key(&p).unwrap(), IdentityKey::Domain("example.com".into()));
    }

    #[test]
    fn identity_resolution_is_idempotent_for_identical_payload() {
        let p = payload(Some("Acme Corp"), None, None, Some("acme.com"));
        assert_eq!(resolve_key(&p), resolve_key(&p));
    }
}
