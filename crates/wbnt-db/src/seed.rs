use sqlx::SqlitePool;
use wbnt_core::catalog::CatalogProduct;
use wbnt_core::homepage::{default_sections, encode_content};

use crate::DbError;

/// Insert the seed catalog when the `products` table is empty.
///
/// Returns the number of products inserted; zero when the table already had
/// rows. All inserts run inside a single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_catalog_if_empty(
    pool: &SqlitePool,
    products: &[CatalogProduct],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    let mut count = 0usize;
    for product in products {
        sqlx::query(
            "INSERT INTO products \
               (name, price, size, status, category, rating, review_count, description, image) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(product.size_or_default())
        .bind(product.status_or_default().as_str())
        .bind(product.category.as_deref())
        .bind(product.rating.unwrap_or(0.0))
        .bind(product.review_count.unwrap_or(0))
        .bind(product.description.as_deref())
        .bind(product.image.as_deref())
        .execute(&mut *tx)
        .await?;
        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}

/// Write the default homepage sections when `homepage_content` is empty.
///
/// Returns the number of sections written; zero when any content exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_homepage_defaults(pool: &SqlitePool) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM homepage_content")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    let sections = default_sections();
    for (key, content) in &sections {
        sqlx::query("INSERT INTO homepage_content (section_key, content) VALUES (?1, ?2)")
            .bind(*key)
            .bind(encode_content(content))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(sections.len())
}
