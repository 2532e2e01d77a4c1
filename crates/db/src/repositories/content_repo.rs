//! Repository for the `contents` and `content_authors` tables.

use lorebase_core::types::DbId;

use crate::models::content::Content;
use crate::DbPool;

/// Provides read operations for content pieces and their authorship.
pub struct ContentRepo;

impl ContentRepo {
    /// Find a content piece by its ID.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Content>, sqlx::Error> {
        sqlx::query_as::<_, Content>(
            "SELECT id, name, created_at, updated_at FROM contents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Number of distinct users credited as authors of a content piece.
    ///
    /// Read fresh on every tally; authorship may change between tallies and
    /// the policy tolerates the staleness.
    pub async fn author_count(pool: &DbPool, content_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT user_id) FROM content_authors WHERE content_id = $1",
        )
        .bind(content_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Email addresses of all credited authors, for notification delivery.
    pub async fn author_emails(pool: &DbPool, content_id: DbId) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT u.email
             FROM content_authors ca
             JOIN users u ON u.id = ca.user_id
             WHERE ca.content_id = $1
             ORDER BY u.email ASC",
        )
        .bind(content_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(email,)| email).collect())
    }
}
