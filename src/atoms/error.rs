// ── Atoms: Error Types ──────────────────────────────────────────────────
// Single canonical error enum for the orchestration layer, built with
// `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, DB, Network, Provider…).
//   • `#[from]` wires std/external error conversions automatically.
//   • Pure-core modules (identity, repost, aggregator arithmetic) never
//     return this type — they do no I/O and report their own small result
//     enums instead. This type is reserved for store/scheduler/HTTP/sheet
//     orchestration.
//   • No variant may carry secret material (API keys, bearer tokens) in
//     its message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobSyncError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite / rusqlite database failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A registered provider's client returned a non-transport failure.
    #[error("provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    /// External sheet transport failure.
    #[error("sheet error: {0}")]
    Sheet(String),

    /// Run lock / client pause coordination failure.
    #[error("lock error: {0}")]
    Lock(String),

    /// Engine configuration is invalid or missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for errors with no dedicated variant yet.
    #[error("{0}")]
    Other(String),
}

impl JobSyncError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { provider: provider.into(), message: message.into() }
    }
}

impl From<String> for JobSyncError {
    fn from(s: String) -> Self {
        JobSyncError::Other(s)
    }
}

impl From<&str> for JobSyncError {
    fn from(s: &str) -> Self {
        JobSyncError::Other(s.to_string())
    }
}

/// All orchestration-layer operations return this type.
pub type JobSyncResult<T> = Result<T, JobSyncError>;
