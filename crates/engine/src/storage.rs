//! Durable storage collaborator.
//!
//! The engine never talks to Postgres directly; it goes through
//! [`DurableEditStore`] so the lifecycle can be exercised against an
//! in-memory fake in tests. [`PgDurableEditStore`] is the production
//! implementation over `lorebase-db`'s repositories.

use async_trait::async_trait;

use lorebase_core::edit::ContentPart;
use lorebase_core::types::DbId;
use lorebase_db::models::finalized_edit::CreateFinalizedEdit;
use lorebase_db::repositories::{ContentRepo, FinalizedEditRepo};
use lorebase_db::DbPool;

use crate::error::EngineResult;

/// Append-only storage for finalized edits plus the authorship reads the
/// tally and notifications depend on.
#[async_trait]
pub trait DurableEditStore: Send + Sync {
    /// Persist an accepted edit. The durable write is the commit point of
    /// finalization and must be idempotent per edit id.
    async fn store_accepted_edit(&self, input: &CreateFinalizedEdit) -> EngineResult<()>;

    /// Persist a rejected edit. Same idempotence contract as
    /// [`store_accepted_edit`](Self::store_accepted_edit).
    async fn store_rejected_edit(&self, input: &CreateFinalizedEdit) -> EngineResult<()>;

    /// Encoded diffs of previously accepted edits for one content part,
    /// ascending by decision time (the merge input order).
    async fn accepted_diffs_for_part(
        &self,
        content_id: DbId,
        content_part: ContentPart,
        part_id: DbId,
    ) -> EngineResult<Vec<String>>;

    /// Number of distinct credited authors of a content piece, read fresh
    /// on every tally.
    async fn author_count(&self, content_id: DbId) -> EngineResult<i64>;

    /// Display name of a content piece, if it exists.
    async fn content_name(&self, content_id: DbId) -> EngineResult<Option<String>>;

    /// Notification recipients: email addresses of all credited authors.
    async fn author_emails(&self, content_id: DbId) -> EngineResult<Vec<String>>;
}

/// Production implementation over the Postgres repositories.
pub struct PgDurableEditStore {
    pool: DbPool,
}

impl PgDurableEditStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableEditStore for PgDurableEditStore {
    async fn store_accepted_edit(&self, input: &CreateFinalizedEdit) -> EngineResult<()> {
        let inserted = FinalizedEditRepo::store_accepted(&self.pool, input).await?;
        if !inserted {
            tracing::warn!(
                edit_id = input.edit_id,
                "Accepted edit was already recorded; durable insert skipped"
            );
        }
        Ok(())
    }

    async fn store_rejected_edit(&self, input: &CreateFinalizedEdit) -> EngineResult<()> {
        let inserted = FinalizedEditRepo::store_rejected(&self.pool, input).await?;
        if !inserted {
            tracing::warn!(
                edit_id = input.edit_id,
                "Rejected edit was already recorded; durable insert skipped"
            );
        }
        Ok(())
    }

    async fn accepted_diffs_for_part(
        &self,
        content_id: DbId,
        content_part: ContentPart,
        part_id: DbId,
    ) -> EngineResult<Vec<String>> {
        let rows = FinalizedEditRepo::list_accepted_for_part(
            &self.pool,
            content_id,
            content_part.as_str(),
            part_id,
        )
        .await?;
        Ok(rows.into_iter().map(|row| row.diff).collect())
    }

    async fn author_count(&self, content_id: DbId) -> EngineResult<i64> {
        Ok(ContentRepo::author_count(&self.pool, content_id).await?)
    }

    async fn content_name(&self, content_id: DbId) -> EngineResult<Option<String>> {
        Ok(ContentRepo::find_by_id(&self.pool, content_id)
            .await?
            .map(|content| content.name))
    }

    async fn author_emails(&self, content_id: DbId) -> EngineResult<Vec<String>> {
        Ok(ContentRepo::author_emails(&self.pool, content_id).await?)
    }
}
