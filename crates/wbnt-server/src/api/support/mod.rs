//! Support threads between buyers and staff.

pub(super) mod customer;
pub(super) mod staff;

use serde::{Deserialize, Serialize};
use wbnt_db::{MessageRow, ThreadRow};

use super::{map_db_error, non_blank, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct MessageRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct MessagesEnvelope {
    pub messages: Vec<MessageRow>,
}

#[derive(Debug, Serialize)]
pub(super) struct ThreadMessagesEnvelope<T: Serialize> {
    pub thread: T,
    pub messages: Vec<MessageRow>,
}

#[derive(Debug, Serialize)]
pub(super) struct ThreadEnvelope<T: Serialize> {
    pub thread: T,
}

#[derive(Debug, Serialize)]
pub(super) struct ThreadsEnvelope<T: Serialize> {
    pub threads: Vec<T>,
}

/// Trimmed message body, or a 400.
fn require_content<'a>(rid: &str, content: Option<&'a str>) -> Result<&'a str, ApiError> {
    non_blank(content)
        .ok_or_else(|| ApiError::new(rid, "validation_error", "Message content required"))
}

async fn fetch_thread(state: &AppState, rid: &str, id: i64) -> Result<ThreadRow, ApiError> {
    wbnt_db::get_thread(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "Thread not found"))
}

async fn thread_messages(
    state: &AppState,
    rid: &str,
    thread_id: i64,
) -> Result<Vec<MessageRow>, ApiError> {
    wbnt_db::list_messages(&state.pool, thread_id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))
}
