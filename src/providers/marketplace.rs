// ── Marketplace Client: Infojobs-shaped Search API ──────────────────────
// Concrete `MarketplaceClient` over a generic "keyword search" HTTP API.
// Retry/backoff uses a fixed 2 s delay on 429/5xx rather than exponential
// backoff, since the scheduler (C9) already owns retry policy at the
// query level — this client retries only to smooth over a single flaky
// response within one query attempt.

use super::{is_retryable_status, MarketplaceClient, SearchMeta, SearchParams, SearchResponse};
use crate::atoms::error::JobSyncError;
use crate::atoms::types::{CompanyPayload, OfferRef, ProviderTag, RawOffer};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const INTRA_REQUEST_RETRIES: u32 = 2;

pub struct InfojobsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl InfojobsClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        InfojobsClient { client, base_url, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    offers: Vec<RawSearchOffer>,
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct RawSearchOffer {
    id: String,
    url: Option<String>,
    title: String,
    company_name: Option<String>,
    company_normalized_name: Option<String>,
    company_website_domain: Option<String>,
    description: Option<String>,
    min_requirements: Option<String>,
    desired_requirements: Option<String>,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    applications_count: Option<i64>,
}

impl From<RawSearchOffer> for RawOffer {
    fn from(raw: RawSearchOffer) -> Self {
        RawOffer {
            reference: OfferRef { provider: ProviderTag::Infojobs, provider_offer_id: raw.id, url: raw.url },
            title: raw.title,
            company: CompanyPayload {
                name: raw.company_name,
                normalized_name: raw.company_normalized_name,
                website_url: None,
                website_domain: raw.company_website_domain,
            },
            description: raw.description,
            min_requirements: raw.min_requirements,
            desired_requirements: raw.desired_requirements,
            requirements_snippet: None,
            published_at: raw.published_at,
            updated_at: raw.updated_at,
            created_at: None,
            applications_count: raw.applications_count,
        }
    }
}

#[async_trait]
impl MarketplaceClient for InfojobsClient {
    async fn search_offers(&self, params: &SearchParams) -> crate::atoms::error::JobSyncResult<SearchResponse> {
        let mut attempt = 0;
        loop {
            let result = self
                .client
                .get(format!("{}/search", self.base_url))
                .bearer_auth(&self.api_key)
                .query(&[("q", params.keywords.as_str()), ("page", &params.page.to_string())])
                .send()
                .await;

            let response = match result {
                Ok(r) => r,
                Err(err) if attempt < INTRA_REQUEST_RETRIES => {
                    attempt += 1;
                    log::warn!("[infojobs] request error, retrying (attempt {attempt}): {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
                Err(err) => return Err(JobSyncError::from(err)),
            };

            let status = response.status();
            if !status.is_success() {
                if is_retryable_status(status.as_u16()) && attempt < INTRA_REQUEST_RETRIES {
                    attempt += 1;
                    log::warn!("[infojobs] status {status}, retrying (attempt {attempt})");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
                return Err(JobSyncError::provider("infojobs", format!("search failed with status {status}")));
            }

            let body: RawSearchResponse = response.json().await?;
            return Ok(SearchResponse {
                offers: body.offers.into_iter().map(RawOffer::from).collect(),
                meta: SearchMeta { total_results: body.total_results, has_more: body.has_more },
            });
        }
    }
}
