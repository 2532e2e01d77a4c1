//! Domain-level error type shared across the workspace.

/// Error type for domain-level failures in `lorebase-core`.
///
/// Higher layers (store, engine, worker) wrap this in their own error enums
/// and map variants to their transport-specific representations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A caller-supplied parameter was malformed or unrecognized.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An invariant was violated; indicates a bug or corrupted data.
    #[error("Internal error: {0}")]
    Internal(String),
}
