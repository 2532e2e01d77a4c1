//! Engine-level error type.

use lorebase_core::diff::DiffError;
use lorebase_core::error::CoreError;
use lorebase_store::StoreError;

/// Error type for lifecycle orchestration.
///
/// Wraps the domain, store, diff, and database error types. Scheduled task
/// bodies treat a missing pending edit as success (the edit was finalized
/// by someone else); user-initiated operations surface it.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain-level error from `lorebase-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A transient-store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A diff computation, restoration, or merge error.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience type alias for engine return values.
pub type EngineResult<T> = Result<T, EngineError>;
