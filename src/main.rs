// ── jobsync: Continuously Running Ingestion Orchestrator ─────────────────
// Entry point: load config, open the store, wire provider/sheet
// adapters, build the static query registry, and dispatch on run mode.
// Config loads first, logger second, fallible setup collapsed into one
// early-return chain before the run-mode dispatch.

mod aggregator;
mod atoms;
mod config;
mod feedback;
mod identity;
mod persistence;
mod pipeline;
mod providers;
mod query_registry;
mod repost;
mod scheduler;
mod scoring;
mod sheet;
mod store;
mod text_norm;

use atoms::types::ProviderTag;
use config::{AppConfig, RunMode};
use providers::ats::HostedAtsClient;
use providers::marketplace::InfojobsClient;
use async_trait::async_trait;
use query_registry::{AtsQueryRunner, MarketplaceQueryRunner};
use scheduler::{CycleHook, QueryRunner};
use scoring::KeywordMatcher;
use sheet::GoogleSheetsClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::Store;

fn build_registry(config: &AppConfig) -> Vec<Box<dyn QueryRunner>> {
    let matcher: Arc<dyn scoring::Matcher> = Arc::new(KeywordMatcher);
    let mut registrations: Vec<Box<dyn QueryRunner>> = Vec::new();

    let infojobs_client: Arc<dyn providers::MarketplaceClient> =
        Arc::new(InfojobsClient::new(config.infojobs_base_url.clone(), config.infojobs_api_key.clone()));
    for keywords in &config.infojobs_keywords {
        registrations.push(Box::new(MarketplaceQueryRunner::new(keywords.clone(), infojobs_client.clone(), matcher.clone())));
    }

    let greenhouse_client: Arc<dyn providers::AtsClient> =
        Arc::new(HostedAtsClient::new(ProviderTag::Greenhouse, "https://boards-api.greenhouse.io/v1".to_string(), config.greenhouse_api_key.clone()));
    for tenant in &config.greenhouse_tenants {
        registrations.push(Box::new(AtsQueryRunner::new(ProviderTag::Greenhouse, tenant.clone(), greenhouse_client.clone(), matcher.clone())));
    }

    let ashby_client: Arc<dyn providers::AtsClient> =
        Arc::new(HostedAtsClient::new(ProviderTag::Ashby, "https://api.ashbyhq.com".to_string(), config.ashby_api_key.clone()));
    for tenant in &config.ashby_tenants {
        registrations.push(Box::new(AtsQueryRunner::new(ProviderTag::Ashby, tenant.clone(), ashby_client.clone(), matcher.clone())));
    }

    registrations
}

async fn run_sheet_sync_and_feedback(store: &Store, sheet_client: &GoogleSheetsClient) {
    match sheet::sync_companies(store, sheet_client).await {
        Ok(counters) => log::info!("[main] sheet sync complete: appended={} updated={}", counters.appended, counters.updated),
        Err(err) => log::error!("[main] sheet sync failed (non-fatal): {err}"),
    }

    // Orchestration-level gate: skip the call into the feedback reader
    // entirely outside the window, rather than trusting its own internal
    // check alone. feedback.rs re-checks the same way right before it
    // reads, so a cycle straddling the boundary still can't slip a write
    // past either layer.
    if !feedback::is_window_open(chrono::Utc::now()) {
        log::info!("[main] feedback loop skipped: outside window at orchestration level");
        return;
    }

    match feedback::process_feedback(store, sheet_client, atoms::constants::SHEET_RANGE, chrono::Utc::now()).await {
        Ok(outcome) if outcome.skipped => log::info!("[main] feedback loop skipped: {:?}", outcome.reason),
        Ok(_) => log::info!("[main] feedback loop complete"),
        Err(err) => log::error!("[main] feedback loop failed (non-fatal): {err}"),
    }
}

/// Wires C10/C11 into C9's per-cycle hook for `run_forever`: running
/// them once after every completed cycle keeps both periodic without
/// coupling scheduler.rs to the sheet module.
struct SheetAndFeedbackHook {
    sheet_client: GoogleSheetsClient,
}

#[async_trait]
impl CycleHook for SheetAndFeedbackHook {
    async fn after_cycle(&self, store: &Store) {
        run_sheet_sync_and_feedback(store, &self.sheet_client).await;
    }
}

fn install_shutdown_handler() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        let mut phase = 0u32;
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            phase += 1;
            if phase == 1 {
                log::warn!("[main] termination signal received, finishing current query before exit");
                flag.store(true, Ordering::SeqCst);
            } else {
                log::warn!("[main] second termination signal received, exiting immediately");
                std::process::exit(130);
            }
        }
    });
    shutdown
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    let store = match Store::open(&config.db_path) {
        Ok(store) => store,
        Err(err) => {
            log::error!("[main] failed to open store at {}: {err}", config.db_path.display());
            std::process::exit(1);
        }
    };

    let registrations = build_registry(&config);
    log::info!("[main] registered {} queries", registrations.len());
    let sheet_client = GoogleSheetsClient::new(config.sheet_id.clone(), config.sheets_api_token.clone());
    let shutdown = install_shutdown_handler();

    match config.run_mode {
        RunMode::Once => {
            let summary = match scheduler::run_once(&store, &registrations, &shutdown).await {
                Ok(summary) => summary,
                Err(err) => {
                    log::error!("[main] cycle failed: {err}");
                    std::process::exit(1);
                }
            };
            run_sheet_sync_and_feedback(&store, &sheet_client).await;

            if summary.queries_failed > 0 {
                std::process::exit(1);
            }
        }
        RunMode::Forever => {
            let hook = SheetAndFeedbackHook { sheet_client };
            scheduler::run_forever(&store, &registrations, config.cycle_sleep_min_secs, config.cycle_sleep_max_secs, shutdown, &hook).await;
            log::info!("[main] shutdown complete");
        }
    }
}
