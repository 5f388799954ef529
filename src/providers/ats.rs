// ── ATS Client: Hosted Greenhouse/Ashby-shaped Job Board API ────────────
// One client parametrized by `ProviderTag`, since both hosted ATS
// providers (greenhouse, ashby) expose the same two-call shape: list
// then hydrate.

use super::{is_retryable_status, AtsClient};
use crate::atoms::error::{JobSyncError, JobSyncResult};
use crate::atoms::types::{CompanyPayload, OfferRef, ProviderTag, RawOffer};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const INTRA_REQUEST_RETRIES: u32 = 2;

pub struct HostedAtsClient {
    client: reqwest::Client,
    provider: ProviderTag,
    base_url: String,
    api_key: String,
}

impl HostedAtsClient {
    pub fn new(provider: ProviderTag, base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        HostedAtsClient { client, provider, base_url, api_key }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> JobSyncResult<T> {
        let mut attempt = 0;
        loop {
            let result = self.client.get(format!("{}{}", self.base_url, path)).bearer_auth(&self.api_key).send().await;
            let response = match result {
                Ok(r) => r,
                Err(err) if attempt < INTRA_REQUEST_RETRIES => {
                    attempt += 1;
                    log::warn!("[{}] request error, retrying (attempt {attempt}): {err}", self.provider);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
                Err(err) => return Err(JobSyncError::from(err)),
            };

            let status = response.status();
            if !status.is_success() {
                if is_retryable_status(status.as_u16()) && attempt < INTRA_REQUEST_RETRIES {
                    attempt += 1;
                    log::warn!("[{}] status {status}, retrying (attempt {attempt})", self.provider);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
                return Err(JobSyncError::provider(self.provider.as_str(), format!("request to {path} failed with status {status}")));
            }

            return Ok(response.json::<T>().await?);
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTenantListing {
    jobs: Vec<RawAtsJob>,
}

#[derive(Debug, Deserialize)]
struct RawAtsJob {
    id: String,
    absolute_url: Option<String>,
    title: String,
    company_name: Option<String>,
    company_website_domain: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    requirements: Option<String>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn to_raw_offer(provider: ProviderTag, job: RawAtsJob) -> RawOffer {
    RawOffer {
        reference: OfferRef { provider, provider_offer_id: job.id, url: job.absolute_url },
        title: job.title,
        company: CompanyPayload {
            name: job.company_name,
            normalized_name: None,
            website_url: None,
            website_domain: job.company_website_domain,
        },
        description: job.description,
        min_requirements: job.requirements,
        desired_requirements: None,
        requirements_snippet: None,
        published_at: None,
        updated_at: job.updated_at,
        created_at: None,
        applications_count: None,
    }
}

#[async_trait]
impl AtsClient for HostedAtsClient {
    async fn list_offers_for_tenant(&self, tenant_key: &str) -> JobSyncResult<Vec<RawOffer>> {
        let listing: RawTenantListing = self.get_json(&format!("/boards/{tenant_key}/jobs")).await?;
        Ok(listing.jobs.into_iter().map(|j| to_raw_offer(self.provider, j)).collect())
    }

    /// The listing call above already returns `description`/`requirements`
    /// for this provider family (unlike a marketplace search result), so
    /// hydration is a pass-through unless a detail is missing, in which
    /// case a per-offer detail fetch fills it in.
    async fn hydrate_offer_details(&self, tenant_key: &str, offers: Vec<RawOffer>) -> JobSyncResult<Vec<RawOffer>> {
        let mut hydrated = Vec::with_capacity(offers.len());
        for mut offer in offers {
            if offer.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
                match self.get_json::<RawAtsJob>(&format!("/boards/{tenant_key}/jobs/{}", offer.reference.provider_offer_id)).await {
                    Ok(detail) => offer.description = detail.description,
                    Err(err) => log::warn!("[{}] hydration failed for {}: {err}", self.provider, offer.reference.provider_offer_id),
                }
            }
            hydrated.push(offer);
        }
        Ok(hydrated)
    }
}
