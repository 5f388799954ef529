// ── Provider Client Trait Boundary ──────────────────────────────────────
// Defines the seam C6 calls through, plus one concrete, simplified
// `reqwest`-based implementation of each so the orchestrator runs
// against a real (if thin) HTTP adapter rather than only a mock.

pub mod ats;
pub mod marketplace;

use crate::atoms::error::JobSyncResult;
use crate::atoms::types::RawOffer;
use async_trait::async_trait;

/// Opaque search parameters for a marketplace query — carried through
/// untouched from the static query registry entry into the client call.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub keywords: String,
    pub page: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SearchMeta {
    pub total_results: u64,
    pub has_more: bool,
}

pub struct SearchResponse {
    pub offers: Vec<RawOffer>,
    pub meta: SearchMeta,
}

/// A general job marketplace.
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    async fn search_offers(&self, params: &SearchParams) -> JobSyncResult<SearchResponse>;
}

/// A hosted ATS (Greenhouse/Ashby-shaped): per-tenant offer listing plus
/// a hydration step that fills in description/requirements — offers
/// without a description are rejected upstream of this trait.
#[async_trait]
pub trait AtsClient: Send + Sync {
    async fn list_offers_for_tenant(&self, tenant_key: &str) -> JobSyncResult<Vec<RawOffer>>;
    async fn hydrate_offer_details(&self, tenant_key: &str, offers: Vec<RawOffer>) -> JobSyncResult<Vec<RawOffer>>;
}

/// Retryable HTTP status codes shared by both client families.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
