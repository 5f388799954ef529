// ── Static Query Registry ─────────────────────────────────────────────────
// Each registered query is keyed as `<client>:<name>:<hash(params)>`.
// Concrete `QueryRunner` implementations for the marketplace (paged
// keyword search) and ATS (per-tenant listing) query shapes, plus the
// builder that turns env-configured keyword/tenant lists into a
// registry.

use crate::atoms::error::JobSyncResult;
use crate::atoms::types::ProviderTag;
use crate::pipeline::{self, PipelineSummary};
use crate::providers::{AtsClient, MarketplaceClient, SearchParams};
use crate::scheduler::QueryRunner;
use crate::scoring::Matcher;
use crate::store::Store;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

fn query_key(client: ProviderTag, name: &str, params_repr: &str) -> String {
    format!("{client}:{name}:{}", short_hash(params_repr))
}

/// One infojobs-shaped keyword search, paged to completion before a
/// single pipeline batch runs over every page's offers, so the run
/// summary still covers exactly one query execution.
pub struct MarketplaceQueryRunner {
    query_key: String,
    keywords: String,
    client: Arc<dyn MarketplaceClient>,
    matcher: Arc<dyn Matcher>,
}

impl MarketplaceQueryRunner {
    pub fn new(keywords: String, client: Arc<dyn MarketplaceClient>, matcher: Arc<dyn Matcher>) -> Self {
        let key = query_key(ProviderTag::Infojobs, &keywords, &keywords);
        MarketplaceQueryRunner { query_key: key, keywords, client, matcher }
    }
}

const MAX_PAGES_PER_QUERY: u32 = 20;

#[async_trait]
impl QueryRunner for MarketplaceQueryRunner {
    fn query_key(&self) -> &str {
        &self.query_key
    }
    fn client(&self) -> ProviderTag {
        ProviderTag::Infojobs
    }
    fn name(&self) -> &str {
        &self.keywords
    }

    async fn run(&self, store: &Store) -> JobSyncResult<PipelineSummary> {
        let mut all_offers = Vec::new();
        let mut page = 0u32;
        let mut pages_fetched = 0i64;
        loop {
            let response = self.client.search_offers(&SearchParams { keywords: self.keywords.clone(), page }).await?;
            pages_fetched += 1;
            all_offers.extend(response.offers);
            if !response.meta.has_more || page + 1 >= MAX_PAGES_PER_QUERY {
                break;
            }
            page += 1;
        }

        pipeline::run_batch(store, self.matcher.as_ref(), ProviderTag::Infojobs, &self.query_key, &all_offers, None, pages_fetched)
    }
}

/// One hosted-ATS tenant listing, hydrated then batched through the
/// pipeline. Company identity is still resolved per offer from the
/// payload's own embedded company fields rather than pinned in advance —
/// pinning a tenant to one company id needs a populated
/// `company_sources` mapping, which discovery (an external collaborator)
/// has not yet produced.
pub struct AtsQueryRunner {
    query_key: String,
    tenant_key: String,
    provider: ProviderTag,
    client: Arc<dyn AtsClient>,
    matcher: Arc<dyn Matcher>,
}

impl AtsQueryRunner {
    pub fn new(provider: ProviderTag, tenant_key: String, client: Arc<dyn AtsClient>, matcher: Arc<dyn Matcher>) -> Self {
        let key = query_key(provider, &tenant_key, &tenant_key);
        AtsQueryRunner { query_key: key, tenant_key, provider, client, matcher }
    }
}

#[async_trait]
impl QueryRunner for AtsQueryRunner {
    fn query_key(&self) -> &str {
        &self.query_key
    }
    fn client(&self) -> ProviderTag {
        self.provider
    }
    fn name(&self) -> &str {
        &self.tenant_key
    }

    async fn run(&self, store: &Store) -> JobSyncResult<PipelineSummary> {
        let listed = self.client.list_offers_for_tenant(&self.tenant_key).await?;
        let hydrated = self.client.hydrate_offer_details(&self.tenant_key, listed).await?;
        pipeline::run_batch(store, self.matcher.as_ref(), self.provider, &self.query_key, &hydrated, None, 1)
    }
}
