//! Database operations for `homepage_content`.

use serde_json::Value;
use sqlx::SqlitePool;
use wbnt_core::homepage::encode_content;

use crate::DbError;

/// A stored homepage section. `content` is the raw stored text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HomepageRow {
    pub section_key: String,
    pub content: String,
}

/// Every stored section, ordered by key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sections(pool: &SqlitePool) -> Result<Vec<HomepageRow>, DbError> {
    let rows = sqlx::query_as::<_, HomepageRow>(
        "SELECT section_key, content FROM homepage_content ORDER BY section_key",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// One section by key, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_section(pool: &SqlitePool, key: &str) -> Result<Option<HomepageRow>, DbError> {
    let row = sqlx::query_as::<_, HomepageRow>(
        "SELECT section_key, content FROM homepage_content WHERE section_key = ?1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Insert or replace a section and return the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_section(
    pool: &SqlitePool,
    key: &str,
    content: &Value,
) -> Result<HomepageRow, DbError> {
    let row = sqlx::query_as::<_, HomepageRow>(
        "INSERT INTO homepage_content (section_key, content) VALUES (?1, ?2) \
         ON CONFLICT (section_key) DO UPDATE SET \
             content = excluded.content, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         RETURNING section_key, content",
    )
    .bind(key)
    .bind(encode_content(content))
    .fetch_one(pool)
    .await?;
    Ok(row)
}
