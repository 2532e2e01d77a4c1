//! Content piece and authorship models.

use serde::Serialize;
use sqlx::FromRow;

use lorebase_core::types::{DbId, Timestamp};

/// A row from the `contents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Content {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `content_authors` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentAuthor {
    pub id: DbId,
    pub content_id: DbId,
    pub user_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
