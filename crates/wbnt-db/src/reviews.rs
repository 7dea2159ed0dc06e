//! Read access to `product_reviews`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::DbError;

/// A row from the `product_reviews` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub product_id: i64,
    pub username: Option<String>,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A review joined with the name of the product it belongs to.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewWithProductRow {
    pub id: i64,
    pub product_id: i64,
    pub username: Option<String>,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `"Unknown"` when the product row is gone.
    pub product_name: String,
}

/// Reviews for one product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reviews_for_product(
    pool: &SqlitePool,
    product_id: i64,
) -> Result<Vec<ReviewRow>, DbError> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        "SELECT id, product_id, username, rating, comment, created_at \
         FROM product_reviews \
         WHERE product_id = ?1 \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Reviews whose ids are in `ids`, newest first. Unknown ids are ignored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reviews_by_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<ReviewRow>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
        "SELECT id, product_id, username, rating, comment, created_at \
         FROM product_reviews WHERE id IN (",
    );
    {
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
    }
    qb.push(") ORDER BY created_at DESC, id DESC");

    let rows = qb.build_query_as::<ReviewRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Every review with its product name, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_all_reviews(pool: &SqlitePool) -> Result<Vec<ReviewWithProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ReviewWithProductRow>(
        "SELECT r.id, r.product_id, r.username, r.rating, r.comment, r.created_at, \
                COALESCE(p.name, 'Unknown') AS product_name \
         FROM product_reviews r \
         LEFT JOIN products p ON p.id = r.product_id \
         ORDER BY r.created_at DESC, r.id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
