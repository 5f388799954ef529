// ── Configuration (A.3) ──────────────────────────────────────────────────
// `AppConfig::from_env()` loads every required runtime setting once at
// startup. Missing required variables produce `JobSyncError::Config`
// and a non-zero exit before any engine work starts.

use crate::atoms::constants::{DEFAULT_CYCLE_SLEEP_MAX_SECS, DEFAULT_CYCLE_SLEEP_MIN_SECS};
use crate::atoms::error::{JobSyncError, JobSyncResult};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Forever,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub sheet_id: String,
    pub run_mode: RunMode,
    pub log_level: String,
    pub infojobs_api_key: String,
    pub infojobs_base_url: String,
    pub greenhouse_api_key: String,
    pub ashby_api_key: String,
    pub sheets_api_token: String,
    pub cycle_sleep_min_secs: u64,
    pub cycle_sleep_max_secs: u64,
    pub infojobs_keywords: Vec<String>,
    pub greenhouse_tenants: Vec<String>,
    pub ashby_tenants: Vec<String>,
}

fn require_env(key: &str) -> JobSyncResult<String> {
    std::env::var(key).map_err(|_| JobSyncError::Config(format!("missing required environment variable {key}")))
}

fn optional_env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Comma-separated list, trimmed, empty entries dropped. Used for the
/// query registry's search keywords and ATS tenant keys, which have no
/// fixed catalog and are entirely env-driven.
fn optional_env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}

impl AppConfig {
    pub fn from_env() -> JobSyncResult<Self> {
        let run_mode = match require_env("JOBSYNC_RUN_MODE")?.as_str() {
            "once" => RunMode::Once,
            "forever" => RunMode::Forever,
            other => return Err(JobSyncError::Config(format!("JOBSYNC_RUN_MODE must be 'once' or 'forever', got {other:?}"))),
        };

        let cycle_sleep_min_secs = optional_env_u64("JOBSYNC_CYCLE_SLEEP_MIN_SECS", DEFAULT_CYCLE_SLEEP_MIN_SECS);
        let cycle_sleep_max_secs = optional_env_u64("JOBSYNC_CYCLE_SLEEP_MAX_SECS", DEFAULT_CYCLE_SLEEP_MAX_SECS);
        if cycle_sleep_min_secs > cycle_sleep_max_secs {
            return Err(JobSyncError::Config(format!(
                "JOBSYNC_CYCLE_SLEEP_MIN_SECS ({cycle_sleep_min_secs}) must not exceed JOBSYNC_CYCLE_SLEEP_MAX_SECS ({cycle_sleep_max_secs})"
            )));
        }

        Ok(AppConfig {
            db_path: PathBuf::from(require_env("JOBSYNC_DB_PATH")?),
            sheet_id: require_env("JOBSYNC_SHEET_ID")?,
            run_mode,
            log_level: std::env::var("JOBSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            infojobs_api_key: require_env("JOBSYNC_INFOJOBS_API_KEY")?,
            infojobs_base_url: std::env::var("JOBSYNC_INFOJOBS_BASE_URL").unwrap_or_else(|_| "https://api.infojobs.net".to_string()),
            greenhouse_api_key: require_env("JOBSYNC_GREENHOUSE_API_KEY")?,
            ashby_api_key: require_env("JOBSYNC_ASHBY_API_KEY")?,
            sheets_api_token: require_env("JOBSYNC_SHEETS_API_TOKEN")?,
            cycle_sleep_min_secs,
            cycle_sleep_max_secs,
            infojobs_keywords: optional_env_list("JOBSYNC_INFOJOBS_KEYWORDS"),
            greenhouse_tenants: optional_env_list("JOBSYNC_GREENHOUSE_TENANTS"),
            ashby_tenants: optional_env_list("JOBSYNC_ASHBY_TENANTS"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize these tests so
    // they don't stomp on each other's env state.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for key in [
            "JOBSYNC_DB_PATH",
            "JOBSYNC_SHEET_ID",
            "JOBSYNC_RUN_MODE",
            "JOBSYNC_LOG_LEVEL",
            "JOBSYNC_INFOJOBS_API_KEY",
            "JOBSYNC_INFOJOBS_BASE_URL",
            "JOBSYNC_GREENHOUSE_API_KEY",
            "JOBSYNC_ASHBY_API_KEY",
            "JOBSYNC_SHEETS_API_TOKEN",
            "JOBSYNC_CYCLE_SLEEP_MIN_SECS",
            "JOBSYNC_CYCLE_SLEEP_MAX_SECS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_required_var_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, JobSyncError::Config(_)));
    }

    #[test]
    fn complete_env_parses_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("JOBSYNC_DB_PATH", "/tmp/jobsync.db");
        std::env::set_var("JOBSYNC_SHEET_ID", "sheet-123");
        std::env::set_var("JOBSYNC_RUN_MODE", "once");
        std::env::set_var("JOBSYNC_INFOJOBS_API_KEY", "key");
        std::env::set_var("JOBSYNC_GREENHOUSE_API_KEY", "key");
        std::env::set_var("JOBSYNC_ASHBY_API_KEY", "key");
        std::env::set_var("JOBSYNC_SHEETS_API_TOKEN", "token");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.run_mode, RunMode::Once);
        assert_eq!(config.cycle_sleep_min_secs, DEFAULT_CYCLE_SLEEP_MIN_SECS);
        clear_all();
    }
}
