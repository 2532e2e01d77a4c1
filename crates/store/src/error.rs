//! Store error taxonomy.

use lorebase_core::types::DbId;

use crate::kv::WrongValueType;

/// Error type for transient-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced edit is not pending. This is an expected race: the
    /// edit may already have been finalized and removed.
    #[error("Pending edit {0} not found")]
    MissingEdit(DbId),

    /// The voter already has a recorded vote for this edit.
    #[error("Voter {voter_id} already voted on edit {edit_id}")]
    DuplicateVote { edit_id: DbId, voter_id: DbId },

    /// A stored record does not match the expected shape. Indicates a
    /// corrupted or foreign record; never swallowed.
    #[error("Failed to decode stored record: {0}")]
    Decode(String),

    /// A record could not be serialized for storage.
    #[error("Failed to encode record for storage: {0}")]
    Encode(String),
}

impl From<WrongValueType> for StoreError {
    fn from(err: WrongValueType) -> Self {
        Self::Decode(err.to_string())
    }
}
