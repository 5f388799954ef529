// ── Atoms: Pure Data Types ──────────────────────────────────────────────
// Plain struct/enum definitions with no logic beyond simple parsing.
// No I/O, no side effects, no imports from `store` or the orchestration
// modules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A company's resolution state, as chosen by a human via the curated
/// sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Pending,
    InProgress,
    HighInterest,
    AlreadyRevolut,
    Accepted,
    Rejected,
}

impl Resolution {
    /// `true` for {ACCEPTED, REJECTED, ALREADY_REVOLUT}.
    pub fn is_resolved(self) -> bool {
        matches!(self, Resolution::AlreadyRevolut | Resolution::Accepted | Resolution::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Pending => "PENDING",
            Resolution::InProgress => "IN_PROGRESS",
            Resolution::HighInterest => "HIGH_INTEREST",
            Resolution::AlreadyRevolut => "ALREADY_REVOLUT",
            Resolution::Accepted => "ACCEPTED",
            Resolution::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Resolution> {
        match s.trim() {
            "PENDING" => Some(Resolution::Pending),
            "IN_PROGRESS" => Some(Resolution::InProgress),
            "HIGH_INTEREST" => Some(Resolution::HighInterest),
            "ALREADY_REVOLUT" => Some(Resolution::AlreadyRevolut),
            "ACCEPTED" => Some(Resolution::Accepted),
            "REJECTED" => Some(Resolution::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag identifying which external provider an offer/company-source came
/// from. Two hosted ATS back-ends plus one general marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderTag {
    Infojobs,
    Greenhouse,
    Ashby,
}

impl ProviderTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderTag::Infojobs => "infojobs",
            ProviderTag::Greenhouse => "greenhouse",
            ProviderTag::Ashby => "ashby",
        }
    }

    /// ATS sources must deliver a detail row with a non-empty
    /// description; the marketplace source may not.
    pub fn is_ats(self) -> bool {
        matches!(self, ProviderTag::Greenhouse | ProviderTag::Ashby)
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-embedded company payload, as carried on an incoming offer
/// and consumed by the identity resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyPayload {
    pub name: Option<String>,
    pub normalized_name: Option<String>,
    pub website_url: Option<String>,
    pub website_domain: Option<String>,
}

/// Canonical offer reference: which provider, which id there, and the
/// listing URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRef {
    pub provider: ProviderTag,
    pub provider_offer_id: String,
    pub url: Option<String>,
}

/// A raw offer payload as handed to the orchestrator by a provider
/// client, in the shape every provider client normalizes its response
/// into before the pipeline sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOffer {
    pub reference: OfferRef,
    pub title: String,
    pub company: CompanyPayload,
    pub description: Option<String>,
    pub min_requirements: Option<String>,
    pub desired_requirements: Option<String>,
    pub requirements_snippet: Option<String>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub applications_count: Option<i64>,
}

impl RawOffer {
    /// Concatenated requirements text, used as the `requirements` column
    /// and as scorer input. Joins whichever of the three requirement
    /// fields are present.
    pub fn requirements_text(&self) -> Option<String> {
        let parts: Vec<&str> = [
            self.min_requirements.as_deref(),
            self.desired_requirements.as_deref(),
            self.requirements_snippet.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Effective seen-at: first non-null of updatedAt, publishedAt,
    /// now-in-UTC.
    pub fn effective_seen_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.updated_at
            .or(self.published_at)
            .unwrap_or_else(chrono::Utc::now)
    }
}
