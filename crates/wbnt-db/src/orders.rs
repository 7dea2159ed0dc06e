//! Database operations for `orders` and `order_items`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub user_id: i64,
    pub shipping_address: String,
    pub payment_method: String,
    pub status: String,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
}

/// An `order_items` row with the current name and image of its product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub price_at_time: i64,
    pub product_name: String,
    pub product_image: Option<String>,
}

/// One priced line to write with a new order.
#[derive(Debug, Clone, Copy)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i64,
    pub price_at_time: i64,
}

const ORDER_COLUMNS: &str =
    "id, user_id, shipping_address, payment_method, status, total_amount, created_at";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Creates a `pending` order with its lines in a single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; nothing is written then.
pub async fn create_order(
    pool: &SqlitePool,
    user_id: i64,
    shipping_address: &str,
    payment_method: &str,
    lines: &[NewOrderLine],
    total_amount: i64,
) -> Result<OrderRow, DbError> {
    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO orders (user_id, shipping_address, payment_method, status, total_amount) \
         VALUES (?1, ?2, ?3, 'pending', ?4) \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(shipping_address)
    .bind(payment_method)
    .bind(total_amount)
    .fetch_one(&mut *tx)
    .await?;

    for line in lines {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, price_at_time) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price_at_time)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(order)
}

/// Sets an order's status. Returns `None` if the order does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_order_status(
    pool: &SqlitePool,
    id: i64,
    status: &str,
) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE orders SET status = ?1 WHERE id = ?2 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(status)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns an order by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order(pool: &SqlitePool, id: i64) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// A user's orders, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE user_id = ?1 \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Every order, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_all_orders(pool: &SqlitePool) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Line items for a batch of orders, grouped by order and in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_items_for_orders(
    pool: &SqlitePool,
    order_ids: &[i64],
) -> Result<Vec<OrderItemRow>, DbError> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
        "SELECT i.id, i.order_id, i.product_id, i.quantity, i.price_at_time, \
                COALESCE(p.name, 'Unknown') AS product_name, \
                p.image AS product_image \
         FROM order_items i \
         LEFT JOIN products p ON p.id = i.product_id \
         WHERE i.order_id IN (",
    );
    {
        let mut list = qb.separated(", ");
        for id in order_ids {
            list.push_bind(*id);
        }
    }
    qb.push(") ORDER BY i.order_id, i.id");

    let rows = qb.build_query_as::<OrderItemRow>().fetch_all(pool).await?;
    Ok(rows)
}
