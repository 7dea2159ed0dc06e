use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use wbnt_db::{SenderRole, ThreadRow};

use crate::middleware::{CurrentUser, RequestId};

use super::super::{
    extract::ApiJson, map_db_error, non_blank, parse_id, ApiError, ApiResponse, AppState,
};
use super::{
    fetch_thread, require_content, thread_messages, MessageRequest, MessagesEnvelope,
    ThreadEnvelope, ThreadMessagesEnvelope, ThreadsEnvelope,
};

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateThreadRequest {
    pub subject: Option<String>,
}

/// Load a thread the caller owns.
async fn own_thread(
    state: &AppState,
    rid: &str,
    user: CurrentUser,
    raw_id: &str,
) -> Result<ThreadRow, ApiError> {
    let id = parse_id(rid, raw_id, "Thread")?;
    let thread = fetch_thread(state, rid, id).await?;
    if thread.user_id != user.id {
        return Err(ApiError::new(rid, "forbidden", "Access denied"));
    }
    Ok(thread)
}

/// GET /api/support/threads
pub(in crate::api) async fn list_threads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<ThreadsEnvelope<ThreadRow>>>, ApiError> {
    let threads = wbnt_db::list_threads_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, ThreadsEnvelope { threads })))
}

/// POST /api/support/threads
pub(in crate::api) async fn create_thread(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<CreateThreadRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ThreadEnvelope<ThreadRow>>>), ApiError> {
    let rid = &req_id.0;
    let subject = non_blank(body.subject.as_deref())
        .ok_or_else(|| ApiError::new(rid, "validation_error", "Subject required"))?;

    let thread = wbnt_db::create_thread(&state.pool, user.id, subject)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(thread_id = thread.id, user_id = user.id, "support thread opened");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, ThreadEnvelope { thread })),
    ))
}

/// GET /api/support/threads/{id}/messages
pub(in crate::api) async fn list_messages(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ThreadMessagesEnvelope<ThreadRow>>>, ApiError> {
    let rid = &req_id.0;
    let thread = own_thread(&state, rid, user, &id).await?;
    let messages = thread_messages(&state, rid, thread.id).await?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        ThreadMessagesEnvelope { thread, messages },
    )))
}

/// POST /api/support/threads/{id}/messages
pub(in crate::api) async fn post_message(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<MessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessagesEnvelope>>), ApiError> {
    let rid = &req_id.0;
    let content = require_content(rid, body.content.as_deref())?;
    let thread = own_thread(&state, rid, user, &id).await?;

    wbnt_db::create_message(&state.pool, thread.id, SenderRole::User, user.id, content)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let messages = thread_messages(&state, rid, thread.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, MessagesEnvelope { messages })),
    ))
}
