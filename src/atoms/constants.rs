// ── Atoms: Constants ────────────────────────────────────────────────────
// Named constants for the crate. Collecting them here eliminates magic
// numbers scattered across components and keeps the fixed configuration
// (only the min/max cycle sleep is env-overridable; the rest are fixed)
// auditable in one place.

use chrono::Duration as ChronoDuration;

/// Max attempts (1 initial + retries) per registered query on TRANSIENT
/// classification before giving up for the cycle.
pub const MAX_QUERY_RETRIES: u32 = 3;
/// Gap between TRANSIENT retry attempts.
pub const TRANSIENT_RETRY_GAP_SECS: u64 = 2;

/// How long a client is paused after a RATE_LIMIT classification.
pub const CLIENT_PAUSE_DURATION: ChronoDuration = ChronoDuration::hours(6);

/// Jitter sleep bounds between queries within a cycle.
pub const QUERY_JITTER_MIN_SECS: u64 = 10;
pub const QUERY_JITTER_MAX_SECS: u64 = 60;

/// Fallback sleep after a cycle-level (non-fatal) failure.
pub const CYCLE_FAILURE_FALLBACK_SLEEP_SECS: u64 = 120;

/// Aggregation batch driver chunk size.
pub const AGGREGATION_CHUNK_SIZE: usize = 50;
/// Aggregation per-company retry count (in addition to the first attempt).
pub const AGGREGATION_MAX_RETRIES: u32 = 2;
pub const AGGREGATION_RETRY_BACKOFF_MS: u64 = 100;

/// Repost-detector similarity fallback threshold (Jaccard over token bags).
pub const SIMILARITY_THRESHOLD: f64 = 0.82;

/// An offer is "strong" once its score reaches this threshold.
pub const STRONG_SCORE_THRESHOLD: i64 = 6;

/// Feedback loop window, local to Europe/Madrid: allowed in [03:00, 06:00).
pub const FEEDBACK_WINDOW_START_HOUR: u32 = 3;
pub const FEEDBACK_WINDOW_END_HOUR: u32 = 6;
pub const FEEDBACK_TIMEZONE: &str = "Europe/Madrid";

/// Global run lock TTL.
pub const RUN_LOCK_TTL: ChronoDuration = ChronoDuration::minutes(30);

/// Name of the single row in the run_lock table.
pub const RUN_LOCK_NAME: &str = "ingestion_cycle";

/// Error message text truncation applied to persisted query_state errors.
pub const ERROR_MESSAGE_MAX_LEN: usize = 500;

/// Default cycle sleep bounds (overridable via env, see `AppConfig`).
pub const DEFAULT_CYCLE_SLEEP_MIN_SECS: u64 = 600;
pub const DEFAULT_CYCLE_SLEEP_MAX_SECS: u64 = 1200;

/// Sheet column layout (`Companies!A:J`), 1-based spreadsheet lettering.
pub const SHEET_RANGE: &str = "Companies!A:J";
pub const SHEET_HEADER: [&str; 10] = [
    "ID Empresa",
    "Empresa",
    "Resolución",
    "Score máx.",
    "Ofertas fuertes",
    "Ofertas únicas",
    "Actividad publicación",
    "Score medio fuerte",
    "Categoría principal",
    "Última oferta fuerte",
];
/// Row batch size for sheet write operations.
pub const SHEET_WRITE_CHUNK_SIZE: usize = 200;

/// `sheetId` (the tab's numeric grid id, distinct from its name) of the
/// `Companies` tab. `0` is the grid id Sheets assigns to the first tab
/// of a spreadsheet created fresh — correct for the single-tab sheet
/// this syncer targets; a multi-tab sheet would need a
/// `spreadsheets.get` lookup to resolve the name to its id, which this
/// client does not perform.
pub const SHEET_GRID_ID: i64 = 0;
/// 0-based column index of the resolution column (`C`) within
/// `SHEET_RANGE`, for `setDataValidation` requests.
pub const SHEET_RESOLUTION_COLUMN_INDEX: i64 = 2;
