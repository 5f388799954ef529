// ── Atoms Layer ─────────────────────────────────────────────────────────
// Pure constants, error types, and data types — zero side effects, no I/O.
// Dependency rule: atoms may only depend on std and external pure crates.
// Nothing here may import from `store` or the orchestration modules.

pub mod constants;
pub mod error;
pub mod types;
