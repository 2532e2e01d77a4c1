//! Finalized (accepted or rejected) edit models.
//!
//! Once an edit reaches a terminal verdict its frozen state is written here
//! and never mutated again. The same row shape serves the `accepted_edits`
//! and `rejected_edits` tables.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use lorebase_core::edit::Vote;
use lorebase_core::types::{DbId, Timestamp};

/// A row from the `accepted_edits` or `rejected_edits` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FinalizedEdit {
    pub id: DbId,
    pub edit_id: DbId,
    pub content_id: DbId,
    pub content_part: String,
    pub part_id: DbId,
    pub diff: String,
    /// The new part text after applying (and merging) the diff. Only
    /// populated for accepted edits.
    pub applied_text: Option<String>,
    pub rationale: Option<String>,
    pub author_kind: String,
    pub author_value: String,
    pub votes: Json<Vec<Vote>>,
    pub voter_ids: Vec<DbId>,
    pub proposed_at: Timestamp,
    pub decided_at: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for inserting a finalized edit record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFinalizedEdit {
    pub edit_id: DbId,
    pub content_id: DbId,
    pub content_part: String,
    pub part_id: DbId,
    pub diff: String,
    pub applied_text: Option<String>,
    pub rationale: Option<String>,
    pub author_kind: String,
    pub author_value: String,
    pub votes: Vec<Vote>,
    pub voter_ids: Vec<DbId>,
    pub proposed_at: Timestamp,
    pub decided_at: Timestamp,
}
