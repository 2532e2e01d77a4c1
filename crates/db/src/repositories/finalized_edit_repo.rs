//! Repository for the `accepted_edits` and `rejected_edits` tables.

use sqlx::types::Json;

use lorebase_core::types::DbId;

use crate::models::finalized_edit::{CreateFinalizedEdit, FinalizedEdit};
use crate::DbPool;

/// Column list for finalized edit queries.
const FINALIZED_EDIT_COLUMNS: &str = "id, edit_id, content_id, content_part, part_id, diff, \
    applied_text, rationale, author_kind, author_value, votes, voter_ids, \
    proposed_at, decided_at, created_at";

/// Provides append-only storage for finalized edits.
pub struct FinalizedEditRepo;

impl FinalizedEditRepo {
    /// Insert an accepted edit record.
    ///
    /// Returns `true` when the row was inserted, `false` when a record for
    /// this edit id already exists. The unique index makes racing finalize
    /// attempts harmless: the second insert is a no-op, not an error.
    pub async fn store_accepted(
        pool: &DbPool,
        input: &CreateFinalizedEdit,
    ) -> Result<bool, sqlx::Error> {
        Self::store(pool, "accepted_edits", input).await
    }

    /// Insert a rejected edit record. Same conflict semantics as
    /// [`store_accepted`](Self::store_accepted).
    pub async fn store_rejected(
        pool: &DbPool,
        input: &CreateFinalizedEdit,
    ) -> Result<bool, sqlx::Error> {
        Self::store(pool, "rejected_edits", input).await
    }

    async fn store(
        pool: &DbPool,
        table: &str,
        input: &CreateFinalizedEdit,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "INSERT INTO {table}
                (edit_id, content_id, content_part, part_id, diff, applied_text,
                 rationale, author_kind, author_value, votes, voter_ids,
                 proposed_at, decided_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (edit_id) DO NOTHING"
        );
        let result = sqlx::query(&query)
            .bind(input.edit_id)
            .bind(input.content_id)
            .bind(&input.content_part)
            .bind(input.part_id)
            .bind(&input.diff)
            .bind(&input.applied_text)
            .bind(&input.rationale)
            .bind(&input.author_kind)
            .bind(&input.author_value)
            .bind(Json(&input.votes))
            .bind(&input.voter_ids)
            .bind(input.proposed_at)
            .bind(input.decided_at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List accepted edits for one content part, oldest decision first.
    ///
    /// This is the merge input order: diffs ascend by acceptance time.
    pub async fn list_accepted_for_part(
        pool: &DbPool,
        content_id: DbId,
        content_part: &str,
        part_id: DbId,
    ) -> Result<Vec<FinalizedEdit>, sqlx::Error> {
        let query = format!(
            "SELECT {FINALIZED_EDIT_COLUMNS} FROM accepted_edits
             WHERE content_id = $1 AND content_part = $2 AND part_id = $3
             ORDER BY decided_at ASC"
        );
        sqlx::query_as::<_, FinalizedEdit>(&query)
            .bind(content_id)
            .bind(content_part)
            .bind(part_id)
            .fetch_all(pool)
            .await
    }

    /// List all accepted edits for a content piece, newest decision first.
    pub async fn list_accepted_for_content(
        pool: &DbPool,
        content_id: DbId,
    ) -> Result<Vec<FinalizedEdit>, sqlx::Error> {
        let query = format!(
            "SELECT {FINALIZED_EDIT_COLUMNS} FROM accepted_edits
             WHERE content_id = $1
             ORDER BY decided_at DESC"
        );
        sqlx::query_as::<_, FinalizedEdit>(&query)
            .bind(content_id)
            .fetch_all(pool)
            .await
    }

    /// List all rejected edits for a content piece, newest decision first.
    pub async fn list_rejected_for_content(
        pool: &DbPool,
        content_id: DbId,
    ) -> Result<Vec<FinalizedEdit>, sqlx::Error> {
        let query = format!(
            "SELECT {FINALIZED_EDIT_COLUMNS} FROM rejected_edits
             WHERE content_id = $1
             ORDER BY decided_at DESC"
        );
        sqlx::query_as::<_, FinalizedEdit>(&query)
            .bind(content_id)
            .fetch_all(pool)
            .await
    }

    /// Find an accepted edit by its original edit id.
    pub async fn find_accepted_by_edit_id(
        pool: &DbPool,
        edit_id: DbId,
    ) -> Result<Option<FinalizedEdit>, sqlx::Error> {
        let query = format!(
            "SELECT {FINALIZED_EDIT_COLUMNS} FROM accepted_edits WHERE edit_id = $1"
        );
        sqlx::query_as::<_, FinalizedEdit>(&query)
            .bind(edit_id)
            .fetch_optional(pool)
            .await
    }
}
