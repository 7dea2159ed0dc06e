//! Database operations for the `products` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    /// Whole pesos.
    pub price: i64,
    pub size: String,
    /// `"Available"` or `"Sold"`.
    pub status: String,
    pub category: Option<String>,
    pub rating: f64,
    pub review_count: i64,
    pub description: Option<String>,
    /// Filename under the uploads directory, or an absolute URL.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values for a new product; defaults are applied by the caller.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub price: i64,
    pub size: &'a str,
    pub status: &'a str,
    pub category: Option<&'a str>,
    pub rating: f64,
    pub review_count: i64,
    pub description: Option<&'a str>,
    pub image: Option<&'a str>,
}

/// Sparse product update. `None` keeps the stored value; for nullable
/// columns `Some(None)` clears it.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub size: Option<String>,
    pub status: Option<String>,
    pub category: Option<Option<String>>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub description: Option<Option<String>>,
    pub image: Option<String>,
}

impl ProductPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.size.is_none()
            && self.status.is_none()
            && self.category.is_none()
            && self.rating.is_none()
            && self.review_count.is_none()
            && self.description.is_none()
            && self.image.is_none()
    }
}

const PRODUCT_COLUMNS: &str = "id, name, price, size, status, category, rating, review_count, \
                               description, image, created_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns products newest first, optionally truncated to `limit` rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &SqlitePool,
    limit: Option<i64>,
) -> Result<Vec<ProductRow>, DbError> {
    // SQLite treats a negative LIMIT as "no limit".
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         ORDER BY created_at DESC, id DESC \
         LIMIT ?1"
    ))
    .bind(limit.filter(|l| *l > 0).unwrap_or(-1))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a product by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &SqlitePool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Number of products in the catalog.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products(pool: &SqlitePool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Inserts a product and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_product(
    pool: &SqlitePool,
    product: &NewProduct<'_>,
) -> Result<ProductRow, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO products \
           (name, price, size, status, category, rating, review_count, description, image) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product.name)
    .bind(product.price)
    .bind(product.size)
    .bind(product.status)
    .bind(product.category)
    .bind(product.rating)
    .bind(product.review_count)
    .bind(product.description)
    .bind(product.image)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Applies a sparse update. Returns `None` if the product does not exist.
///
/// An empty patch is a plain read.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_product(
    pool: &SqlitePool,
    id: i64,
    patch: &ProductPatch,
) -> Result<Option<ProductRow>, DbError> {
    if patch.is_empty() {
        return get_product(pool, id).await;
    }

    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE products SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(ref name) = patch.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(price) = patch.price {
            set.push("price = ").push_bind_unseparated(price);
        }
        if let Some(ref size) = patch.size {
            set.push("size = ").push_bind_unseparated(size);
        }
        if let Some(ref status) = patch.status {
            set.push("status = ").push_bind_unseparated(status);
        }
        if let Some(ref category) = patch.category {
            set.push("category = ").push_bind_unseparated(category);
        }
        if let Some(rating) = patch.rating {
            set.push("rating = ").push_bind_unseparated(rating);
        }
        if let Some(review_count) = patch.review_count {
            set.push("review_count = ").push_bind_unseparated(review_count);
        }
        if let Some(ref description) = patch.description {
            set.push("description = ").push_bind_unseparated(description);
        }
        if let Some(ref image) = patch.image {
            set.push("image = ").push_bind_unseparated(image);
        }
    }
    qb.push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(PRODUCT_COLUMNS);

    let row = qb
        .build_query_as::<ProductRow>()
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Deletes a product together with its reviews and the order lines that
/// reference it, in one transaction. Returns the deleted row so the caller
/// can clean up its image, or `None` if it did not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is deleted then.
pub async fn delete_product(pool: &SqlitePool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(existing) = existing else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM product_reviews WHERE product_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM order_items WHERE product_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM products WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(existing))
}

/// Current price and availability for the given product ids.
///
/// Unknown ids are simply absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn price_quotes(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<Vec<(i64, i64, String)>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("SELECT id, price, status FROM products WHERE id IN (");
    {
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
    }
    qb.push(")");

    let rows = qb
        .build_query_as::<(i64, i64, String)>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
