//! Database operations for the `users` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A `users` row without the password hash; safe to serialize.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Login lookup row. Never serialized.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentialsRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl UserCredentialsRow {
    #[must_use]
    pub fn into_user(self) -> UserRow {
        UserRow {
            id: self.id,
            email: self.email,
            username: self.username,
            role: self.role,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Minimal user projection used to decorate threads and orders.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
}

const USER_COLUMNS: &str = "id, email, username, role, status, created_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts a user and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Duplicate`] for a taken email or username,
/// [`DbError::AdminConstraint`] when a second admin is attempted, or
/// [`DbError::Sqlx`] for any other failure.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    username: &str,
    password_hash: &str,
    role: &str,
) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (email, username, password_hash, role) \
         VALUES (?1, ?2, ?3, ?4) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)
}

/// Returns a user by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns the login row for an email address, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_credentials_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserCredentialsRow>, DbError> {
    let row = sqlx::query_as::<_, UserCredentialsRow>(
        "SELECT id, email, username, password_hash, role, status, created_at \
         FROM users WHERE email = ?1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns every user ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns the lightweight projection of every user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_refs(pool: &SqlitePool) -> Result<Vec<UserRef>, DbError> {
    let rows = sqlx::query_as::<_, UserRef>("SELECT id, username, email, role FROM users")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Id of the founding admin (lowest id holding the admin role).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn first_admin_id(pool: &SqlitePool) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM users WHERE role = 'admin' ORDER BY id ASC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Sets a user's role. Returns `None` if no such user exists.
///
/// # Errors
///
/// Returns [`DbError::AdminConstraint`] if a single-admin trigger fires, or
/// [`DbError::Sqlx`] for any other failure.
pub async fn update_user_role(
    pool: &SqlitePool,
    id: i64,
    role: &str,
) -> Result<Option<UserRow>, DbError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET role = ?1 WHERE id = ?2 RETURNING {USER_COLUMNS}"
    ))
    .bind(role)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(DbError::from_write)
}

/// Sets a user's account status. Returns `None` if no such user exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_user_status(
    pool: &SqlitePool,
    id: i64,
    status: &str,
) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET status = ?1 WHERE id = ?2 RETURNING {USER_COLUMNS}"
    ))
    .bind(status)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
