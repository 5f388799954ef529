// ── Query/Task Scheduler (C9) ─────────────────────────────────────────────
// Drives the static query registry through lock acquisition, per-query
// retry/classification, and cycle sleep. Exception-as-control-flow is
// avoided deliberately: the retry loop is driven by a plain result
// variant (`ErrorClass`) rather than matching on thrown error types —
// only the transport boundary (`dyn Error::to_string()`) still goes
// through string classification, since that is genuinely where an
// opaque provider failure first becomes text.

use crate::atoms::constants::{
    CLIENT_PAUSE_DURATION, CYCLE_FAILURE_FALLBACK_SLEEP_SECS, ERROR_MESSAGE_MAX_LEN, MAX_QUERY_RETRIES, QUERY_JITTER_MAX_SECS,
    QUERY_JITTER_MIN_SECS, RUN_LOCK_NAME, TRANSIENT_RETRY_GAP_SECS,
};
use crate::atoms::error::JobSyncResult;
use crate::atoms::types::ProviderTag;
use crate::pipeline::PipelineSummary;
use crate::store::Store;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One registered unit of work: a marketplace search or an ATS tenant
/// listing, bound to its scorer and query key ahead of time.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    fn query_key(&self) -> &str;
    fn client(&self) -> ProviderTag;
    fn name(&self) -> &str;
    async fn run(&self, store: &Store) -> JobSyncResult<PipelineSummary>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorClass {
    Fatal,
    RateLimit,
    Transient,
}

impl ErrorClass {
    fn code(self) -> &'static str {
        match self {
            ErrorClass::Fatal => "FATAL",
            ErrorClass::RateLimit => "RATE_LIMIT",
            ErrorClass::Transient => "TRANSIENT",
        }
    }
}

/// Case-insensitive keyword classification of an opaque error message
///. Defaults to TRANSIENT — safer
/// to retry than to give up on an unrecognized failure.
fn classify_error(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if lower.contains("authentication") || lower.contains("credential") || lower.contains("invalid config") {
        return ErrorClass::Fatal;
    }
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate-limit") {
        return ErrorClass::RateLimit;
    }
    if lower.contains("timeout")
        || lower.contains("network")
        || lower.contains("connection refused")
        || lower.contains("name not found")
        || lower.contains("name-not-found")
        || ["500", "502", "503", "504"].iter().any(|code| lower.contains(code))
    {
        return ErrorClass::Transient;
    }
    ErrorClass::Transient
}

fn truncate_error(message: &str) -> String {
    if message.len() <= ERROR_MESSAGE_MAX_LEN {
        message.to_string()
    } else {
        message.chars().take(ERROR_MESSAGE_MAX_LEN).collect()
    }
}

/// Sleeps `total`, waking every second to check `shutdown` so a pending
/// termination signal is honored promptly rather than after the full
/// duration.
async fn cancellable_sleep(total: Duration, shutdown: &AtomicBool) {
    let step = Duration::from_secs(1);
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let chunk = remaining.min(step);
        tokio::time::sleep(chunk).await;
        remaining -= chunk;
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub lock_acquired: bool,
    pub queries_run: usize,
    pub queries_succeeded: usize,
    pub queries_skipped_paused: usize,
    pub queries_failed: usize,
}

/// Runs every registered query once, sequentially, under the global run
/// lock. Returns a zeroed, `lock_acquired:
/// false` summary if the lock could not be acquired — this is not an
/// error, just a concurrent cycle already in flight.
pub async fn run_once(store: &Store, registrations: &[Box<dyn QueryRunner>], shutdown: &AtomicBool) -> JobSyncResult<CycleSummary> {
    let owner_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    if !store.try_acquire_lock(RUN_LOCK_NAME, &owner_id, now)? {
        log::warn!("[scheduler] could not acquire run lock, skipping cycle");
        return Ok(CycleSummary::default());
    }

    let mut summary = CycleSummary { lock_acquired: true, ..Default::default() };
    for registration in registrations {
        store.ensure_query_state(registration.query_key(), registration.client(), registration.name())?;
    }

    for (idx, registration) in registrations.iter().enumerate() {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("[scheduler] termination requested, finishing cycle early after {} of {} queries", idx, registrations.len());
            break;
        }

        if store.get_active_pause(registration.client().as_str(), Utc::now())?.is_some() {
            log::info!("[scheduler] {} is paused, skipping {}", registration.client(), registration.query_key());
            summary.queries_skipped_paused += 1;
            continue;
        }

        summary.queries_run += 1;
        if run_query_with_retries(store, registration.as_ref()).await {
            summary.queries_succeeded += 1;
        } else {
            summary.queries_failed += 1;
        }

        if !store.renew_lock(RUN_LOCK_NAME, &owner_id, Utc::now())? {
            log::warn!("[scheduler] run lock was lost mid-cycle, ending cycle early");
            return Ok(summary);
        }

        if idx + 1 < registrations.len() {
            let jitter_secs = rand::thread_rng().gen_range(QUERY_JITTER_MIN_SECS..=QUERY_JITTER_MAX_SECS);
            cancellable_sleep(Duration::from_secs(jitter_secs), shutdown).await;
        }
    }

    store.release_lock(RUN_LOCK_NAME, &owner_id)?;
    log::info!(
        "[scheduler] cycle complete: ran={} succeeded={} failed={} skipped_paused={}",
        summary.queries_run,
        summary.queries_succeeded,
        summary.queries_failed,
        summary.queries_skipped_paused,
    );
    Ok(summary)
}

/// One query's retry loop: classifies each failure as FATAL,
/// RATE_LIMIT, or TRANSIENT and reacts accordingly. Returns `true` on
/// eventual success, `false` once the query has exhausted its retries
/// or hit a non-retryable outcome — either way this never aborts the
/// surrounding cycle.
async fn run_query_with_retries(store: &Store, registration: &dyn QueryRunner) -> bool {
    let query_key = registration.query_key();
    if let Err(err) = store.mark_query_running(query_key) {
        log::error!("[scheduler] failed to mark {query_key} running: {err}");
    }

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match registration.run(store).await {
            Ok(summary) => {
                if let Err(err) = store.record_query_success(query_key, Utc::now(), None) {
                    log::error!("[scheduler] failed to record success for {query_key}: {err}");
                }
                log::info!("[scheduler] {query_key} succeeded on attempt {attempt}: status={}", summary.status);
                return true;
            }
            Err(err) => {
                let class = classify_error(&err.to_string());
                let message = truncate_error(&err.to_string());
                if let Err(store_err) = store.record_query_failure(query_key, Utc::now(), class.code(), &message) {
                    log::error!("[scheduler] failed to record failure for {query_key}: {store_err}");
                }

                match class {
                    ErrorClass::Fatal => {
                        log::error!("[scheduler] {query_key} failed fatally: {message}");
                        return false;
                    }
                    ErrorClass::RateLimit => {
                        log::warn!("[scheduler] {query_key} rate limited, pausing {} for 6h", registration.client());
                        if let Err(pause_err) =
                            store.pause_client(registration.client().as_str(), Utc::now() + CLIENT_PAUSE_DURATION, Some("RATE_LIMIT"))
                        {
                            log::error!("[scheduler] failed to pause {}: {pause_err}", registration.client());
                        }
                        return false;
                    }
                    ErrorClass::Transient => {
                        if attempt >= MAX_QUERY_RETRIES {
                            log::error!("[scheduler] {query_key} exhausted {attempt} attempts: {message}");
                            return false;
                        }
                        log::warn!("[scheduler] {query_key} transient failure (attempt {attempt}), retrying: {message}");
                        tokio::time::sleep(Duration::from_secs(TRANSIENT_RETRY_GAP_SECS)).await;
                    }
                }
            }
        }
    }
}

/// What the caller wants done once per completed cycle, after queries
/// and before the cycle sleep. `main` supplies sheet sync (C11) and
/// feedback (C10) here as a trait object rather than scheduler.rs
/// importing the sheet module directly.
#[async_trait]
pub trait CycleHook: Send + Sync {
    async fn after_cycle(&self, store: &Store);
}

/// Repeats `run_once` until `shutdown` is set.
/// A cycle-level error is caught and followed by a fixed fallback sleep
/// rather than propagating, since one bad cycle should not kill the
/// process.
pub async fn run_forever(
    store: &Store,
    registrations: &[Box<dyn QueryRunner>],
    cycle_sleep_min_secs: u64,
    cycle_sleep_max_secs: u64,
    shutdown: Arc<AtomicBool>,
    hook: &dyn CycleHook,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match run_once(store, registrations, &shutdown).await {
            Ok(summary) => {
                log::info!("[scheduler] cycle finished: {summary:?}");
                hook.after_cycle(store).await;
            }
            Err(err) => {
                log::error!("[scheduler] cycle failed: {err}, sleeping {CYCLE_FAILURE_FALLBACK_SLEEP_SECS}s before retry");
                cancellable_sleep(Duration::from_secs(CYCLE_FAILURE_FALLBACK_SLEEP_SECS), &shutdown).await;
                continue;
            }
        }

        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let sleep_secs = rand::thread_rng().gen_range(cycle_sleep_min_secs..=cycle_sleep_max_secs);
        log::info!("[scheduler] sleeping {sleep_secs}s before next cycle");
        cancellable_sleep(Duration::from_secs(sleep_secs), &shutdown).await;
    }
    log::info!("[scheduler] shutdown requested, exiting run_forever");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::runs::RunCounters;
    use std::sync::atomic::AtomicU32;

    struct FlakyRunner {
        query_key: String,
        client: ProviderTag,
        failures_before_success: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl QueryRunner for FlakyRunner {
        fn query_key(&self) -> &str {
            &self.query_key
        }
        fn client(&self) -> ProviderTag {
            self.client
        }
        fn name(&self) -> &str {
            "flaky"
        }
        async fn run(&self, _store: &Store) -> JobSyncResult<PipelineSummary> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures_before_success {
                return Err(crate::atoms::error::JobSyncError::provider("infojobs", "request timeout"));
            }
            Ok(PipelineSummary { run_id: 0, status: "success".to_string(), counters: RunCounters::default() })
        }
    }

    struct FatalRunner;

    #[async_trait]
    impl QueryRunner for FatalRunner {
        fn query_key(&self) -> &str {
            "infojobs:fatal:h1"
        }
        fn client(&self) -> ProviderTag {
            ProviderTag::Infojobs
        }
        fn name(&self) -> &str {
            "fatal"
        }
        async fn run(&self, _store: &Store) -> JobSyncResult<PipelineSummary> {
            Err(crate::atoms::error::JobSyncError::provider("infojobs", "authentication failed: bad api key"))
        }
    }

    #[test]
    fn classification_matches_keywords_case_insensitively() {
        assert_eq!(classify_error("Authentication failed"), ErrorClass::Fatal);
        assert_eq!(classify_error("missing credential"), ErrorClass::Fatal);
        assert_eq!(classify_error("HTTP 429 Too Many Requests"), ErrorClass::RateLimit);
        assert_eq!(classify_error("connection refused"), ErrorClass::Transient);
        assert_eq!(classify_error("server returned 503"), ErrorClass::Transient);
        assert_eq!(classify_error("something entirely unrecognized"), ErrorClass::Transient);
    }

    #[tokio::test]
    async fn transient_failure_retries_then_succeeds() {
        let store = Store::open_in_memory().unwrap();
        let runner: Box<dyn QueryRunner> =
            Box::new(FlakyRunner { query_key: "infojobs:rust:h1".into(), client: ProviderTag::Infojobs, failures_before_success: 2, attempts: AtomicU32::new(0) });
        let registrations = vec![runner];
        let shutdown = AtomicBool::new(false);

        for r in &registrations {
            store.ensure_query_state(r.query_key(), r.client(), r.name()).unwrap();
        }
        let ok = run_query_with_retries(&store, registrations[0].as_ref()).await;
        assert!(ok);

        let state = store.get_query_state("infojobs:rust:h1").unwrap().unwrap();
        assert_eq!(state.status, "IDLE");
        assert_eq!(state.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn fatal_failure_does_not_retry() {
        let store = Store::open_in_memory().unwrap();
        let runner = FatalRunner;
        store.ensure_query_state(runner.query_key(), runner.client(), runner.name()).unwrap();

        let ok = run_query_with_retries(&store, &runner).await;
        assert!(!ok);

        let state = store.get_query_state("infojobs:fatal:h1").unwrap().unwrap();
        assert_eq!(state.last_error_code.as_deref(), Some("FATAL"));
        assert_eq!(state.consecutive_failures, 1);
    }

    struct CountingHook {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CycleHook for CountingHook {
        async fn after_cycle(&self, _store: &Store) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn run_forever_stops_promptly_on_shutdown_and_runs_hook_once() {
        let store = Store::open_in_memory().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let hook = CountingHook { calls: AtomicU32::new(0) };

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            shutdown_clone.store(true, Ordering::SeqCst);
        });

        run_forever(&store, &[], 3600, 3600, shutdown, &hook).await;
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn paused_client_is_skipped_without_running() {
        let store = Store::open_in_memory().unwrap();
        store.pause_client("infojobs", Utc::now() + chrono::Duration::hours(1), Some("RATE_LIMIT")).unwrap();

        let runner: Box<dyn QueryRunner> =
            Box::new(FlakyRunner { query_key: "infojobs:rust:h1".into(), client: ProviderTag::Infojobs, failures_before_success: 0, attempts: AtomicU32::new(0) });
        let registrations = vec![runner];
        let shutdown = AtomicBool::new(false);

        let summary = run_once(&store, &registrations, &shutdown).await.unwrap();
        assert_eq!(summary.queries_skipped_paused, 1);
        assert_eq!(summary.queries_run, 0);
    }
}
