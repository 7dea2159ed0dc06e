//! Database operations for `support_threads` and `support_messages`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `support_threads` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ThreadRow {
    pub id: i64,
    /// The customer who opened the thread.
    pub user_id: i64,
    pub subject: String,
    /// Moderator handling the thread, if any.
    pub assigned_to: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `support_messages` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub thread_id: i64,
    pub sender_role: String,
    pub sender_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Which side of the conversation wrote a message. Staff replies are all
/// stored as `admin`, whether written by the admin or a moderator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderRole {
    User,
    Admin,
}

impl SenderRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SenderRole::User => "user",
            SenderRole::Admin => "admin",
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const THREAD_COLUMNS: &str = "id, user_id, subject, assigned_to, created_at";
const MESSAGE_COLUMNS: &str = "id, thread_id, sender_role, sender_id, content, created_at";

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

/// Opens a new, unassigned thread for `user_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_thread(
    pool: &SqlitePool,
    user_id: i64,
    subject: &str,
) -> Result<ThreadRow, DbError> {
    let row = sqlx::query_as::<_, ThreadRow>(&format!(
        "INSERT INTO support_threads (user_id, subject) VALUES (?1, ?2) \
         RETURNING {THREAD_COLUMNS}"
    ))
    .bind(user_id)
    .bind(subject)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns a thread by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_thread(pool: &SqlitePool, id: i64) -> Result<Option<ThreadRow>, DbError> {
    let row = sqlx::query_as::<_, ThreadRow>(&format!(
        "SELECT {THREAD_COLUMNS} FROM support_threads WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Every thread, newest first. Visibility filtering happens in the caller.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_threads(pool: &SqlitePool) -> Result<Vec<ThreadRow>, DbError> {
    let rows = sqlx::query_as::<_, ThreadRow>(&format!(
        "SELECT {THREAD_COLUMNS} FROM support_threads ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// A customer's own threads, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_threads_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<ThreadRow>, DbError> {
    let rows = sqlx::query_as::<_, ThreadRow>(&format!(
        "SELECT {THREAD_COLUMNS} FROM support_threads \
         WHERE user_id = ?1 \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Sets or clears a thread's assignee. Returns `None` if the thread does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_thread_assignee(
    pool: &SqlitePool,
    id: i64,
    assigned_to: Option<i64>,
) -> Result<Option<ThreadRow>, DbError> {
    let row = sqlx::query_as::<_, ThreadRow>(&format!(
        "UPDATE support_threads SET assigned_to = ?1 WHERE id = ?2 RETURNING {THREAD_COLUMNS}"
    ))
    .bind(assigned_to)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Assigns an unassigned thread to `moderator_id`.
///
/// Returns the updated row, or `None` when the thread is missing or someone
/// else claimed it first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn claim_thread(
    pool: &SqlitePool,
    id: i64,
    moderator_id: i64,
) -> Result<Option<ThreadRow>, DbError> {
    let row = sqlx::query_as::<_, ThreadRow>(&format!(
        "UPDATE support_threads SET assigned_to = ?1 \
         WHERE id = ?2 AND assigned_to IS NULL \
         RETURNING {THREAD_COLUMNS}"
    ))
    .bind(moderator_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Appends a message to a thread.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_message(
    pool: &SqlitePool,
    thread_id: i64,
    sender_role: SenderRole,
    sender_id: i64,
    content: &str,
) -> Result<MessageRow, DbError> {
    let row = sqlx::query_as::<_, MessageRow>(&format!(
        "INSERT INTO support_messages (thread_id, sender_role, sender_id, content) \
         VALUES (?1, ?2, ?3, ?4) \
         RETURNING {MESSAGE_COLUMNS}"
    ))
    .bind(thread_id)
    .bind(sender_role.as_str())
    .bind(sender_id)
    .bind(content)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// A thread's messages, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_messages(pool: &SqlitePool, thread_id: i64) -> Result<Vec<MessageRow>, DbError> {
    let rows = sqlx::query_as::<_, MessageRow>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM support_messages \
         WHERE thread_id = ?1 \
         ORDER BY created_at ASC, id ASC"
    ))
    .bind(thread_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
