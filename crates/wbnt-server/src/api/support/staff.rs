//! Staff inbox. Visibility and assignment rules live in
//! `wbnt_core::support`; these handlers load the rows and apply them.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wbnt_core::{
    support::{check_access, check_assignment, claims_on_open, is_visible_to, SupportDenied},
    Role,
};
use wbnt_db::{SenderRole, ThreadRow, UserRef};

use crate::middleware::{CurrentUser, RequestId};

use super::super::{
    extract::ApiJson, map_db_error, parse_id, ApiError, ApiResponse, AppState, UserSummary,
};
use super::{
    fetch_thread, require_content, thread_messages, MessageRequest, MessagesEnvelope,
    ThreadEnvelope, ThreadMessagesEnvelope, ThreadsEnvelope,
};

#[derive(Debug, Deserialize)]
pub(in crate::api) struct AssignRequest {
    #[serde(default)]
    pub assigned_to: Option<Value>,
}

/// A thread with its customer and assignee attached.
#[derive(Debug, Serialize)]
pub(in crate::api) struct StaffThread {
    #[serde(flatten)]
    pub thread: ThreadRow,
    pub user: UserSummary,
    pub assigned_to_user: Option<UserSummary>,
}

fn denied(rid: &str, reason: &SupportDenied) -> ApiError {
    let code = if reason.is_bad_request() {
        "bad_request"
    } else {
        "forbidden"
    };
    ApiError::new(rid, code, reason.to_string())
}

fn parse_role(raw: &str) -> Option<Role> {
    raw.parse::<Role>().ok()
}

/// `null` and absent mean "unassign"; numbers and numeric strings name a user.
fn parse_assignee(rid: &str, raw: Option<&Value>) -> Result<Option<i64>, ApiError> {
    let invalid = || {
        ApiError::new(
            rid,
            "validation_error",
            "assigned_to must be a user id or null",
        )
    };
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

fn enrich(thread: ThreadRow, users: &HashMap<i64, UserRef>) -> StaffThread {
    StaffThread {
        user: users
            .get(&thread.user_id)
            .map_or_else(UserSummary::unknown, UserSummary::from),
        assigned_to_user: thread
            .assigned_to
            .and_then(|id| users.get(&id))
            .map(UserSummary::from),
        thread,
    }
}

async fn user_directory(state: &AppState, rid: &str) -> Result<HashMap<i64, UserRef>, ApiError> {
    let users = wbnt_db::list_user_refs(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

async fn role_of(state: &AppState, rid: &str, user_id: i64) -> Result<Option<Role>, ApiError> {
    let user = wbnt_db::get_user(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    Ok(user.and_then(|u| parse_role(&u.role)))
}

/// Load a thread and check the actor may work it.
async fn accessible_thread(
    state: &AppState,
    rid: &str,
    user: CurrentUser,
    id: i64,
) -> Result<ThreadRow, ApiError> {
    let thread = fetch_thread(state, rid, id).await?;
    let owner_role = role_of(state, rid, thread.user_id).await?;
    check_access(user.actor(), owner_role, thread.assigned_to).map_err(|d| denied(rid, &d))?;
    Ok(thread)
}

/// GET /api/admin/support/threads
pub(in crate::api) async fn list_threads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<ThreadsEnvelope<StaffThread>>>, ApiError> {
    let rid = &req_id.0;
    let users = user_directory(&state, rid).await?;
    let threads = wbnt_db::list_threads(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let actor = user.actor();
    let threads = threads
        .into_iter()
        .filter(|t| {
            let owner_role = users.get(&t.user_id).and_then(|u| parse_role(&u.role));
            is_visible_to(actor, owner_role, t.assigned_to)
        })
        .map(|t| enrich(t, &users))
        .collect();

    Ok(Json(ApiResponse::new(req_id.0, ThreadsEnvelope { threads })))
}

/// GET /api/admin/support/threads/{id}/messages
///
/// A moderator opening an unassigned thread takes it.
pub(in crate::api) async fn list_messages(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ThreadMessagesEnvelope<StaffThread>>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "Thread")?;
    let mut thread = accessible_thread(&state, rid, user, id).await?;

    if claims_on_open(user.actor(), thread.assigned_to) {
        let claimed = wbnt_db::claim_thread(&state.pool, id, user.id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
        thread = match claimed {
            Some(claimed) => {
                tracing::info!(thread_id = id, moderator_id = user.id, "thread claimed on open");
                claimed
            }
            // Someone else claimed it first; re-check against the new owner.
            None => accessible_thread(&state, rid, user, id).await?,
        };
    }

    let messages = thread_messages(&state, rid, id).await?;
    let users = user_directory(&state, rid).await?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        ThreadMessagesEnvelope {
            thread: enrich(thread, &users),
            messages,
        },
    )))
}

/// PATCH /api/admin/support/threads/{id}/assign
pub(in crate::api) async fn assign_thread(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssignRequest>,
) -> Result<Json<ApiResponse<ThreadEnvelope<StaffThread>>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "Thread")?;
    let requested = parse_assignee(rid, body.assigned_to.as_ref())?;

    let thread = fetch_thread(&state, rid, id).await?;
    let owner_role = role_of(&state, rid, thread.user_id).await?;
    let target_role = match requested {
        Some(target) => role_of(&state, rid, target).await?,
        None => None,
    };

    let actor = user.actor();
    check_assignment(actor, owner_role, thread.assigned_to, requested, target_role).map_err(
        |reason| match reason {
            SupportDenied::NotACustomerThread => {
                ApiError::new(rid, "forbidden", "Can only assign buyer threads")
            }
            other => denied(rid, &other),
        },
    )?;

    let updated = match (actor.role, requested) {
        // Self-assignment only lands if the thread is still unassigned.
        (Role::Mod, Some(_)) => wbnt_db::claim_thread(&state.pool, id, actor.id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .ok_or_else(|| denied(rid, &SupportDenied::AlreadyAssigned))?,
        _ => wbnt_db::set_thread_assignee(&state.pool, id, requested)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .ok_or_else(|| ApiError::new(rid, "not_found", "Thread not found"))?,
    };

    tracing::info!(
        thread_id = id,
        actor_id = actor.id,
        assigned_to = ?updated.assigned_to,
        "thread assignment changed"
    );

    let users = user_directory(&state, rid).await?;
    Ok(Json(ApiResponse::new(
        req_id.0,
        ThreadEnvelope {
            thread: enrich(updated, &users),
        },
    )))
}

/// POST /api/admin/support/threads/{id}/messages
pub(in crate::api) async fn post_message(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<MessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessagesEnvelope>>), ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "Thread")?;
    let content = require_content(rid, body.content.as_deref())?;
    let thread = accessible_thread(&state, rid, user, id).await?;

    wbnt_db::create_message(&state.pool, thread.id, SenderRole::Admin, user.id, content)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let messages = thread_messages(&state, rid, thread.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, MessagesEnvelope { messages })),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn assignee_accepts_numbers_strings_and_null() {
        assert_eq!(parse_assignee("r", None).ok(), Some(None));
        assert_eq!(parse_assignee("r", Some(&Value::Null)).ok(), Some(None));
        assert_eq!(parse_assignee("r", Some(&json!(7))).ok(), Some(Some(7)));
        assert_eq!(parse_assignee("r", Some(&json!(" 7 "))).ok(), Some(Some(7)));
        assert!(parse_assignee("r", Some(&json!("seven"))).is_err());
        assert!(parse_assignee("r", Some(&json!([7]))).is_err());
    }

    #[test]
    fn denial_codes_follow_reason() {
        assert_eq!(
            denied("r", &SupportDenied::AlreadyAssigned).error.code,
            "bad_request"
        );
        let forbidden = denied("r", &SupportDenied::AssignedElsewhere);
        assert_eq!(forbidden.error.code, "forbidden");
        assert_eq!(
            forbidden.error.message,
            "This thread is assigned to another moderator"
        );
    }

    #[test]
    fn enrich_falls_back_to_unknown_customer() {
        let thread = ThreadRow {
            id: 1,
            user_id: 99,
            subject: "Sizing".to_string(),
            assigned_to: Some(2),
            created_at: chrono::Utc::now(),
        };
        let users: HashMap<i64, UserRef> = [(
            2,
            UserRef {
                id: 2,
                username: "mika".to_string(),
                email: "mika@wbnt.com".to_string(),
                role: "mod".to_string(),
            },
        )]
        .into_iter()
        .collect();

        let enriched = enrich(thread, &users);
        assert_eq!(enriched.user, UserSummary::unknown());
        assert_eq!(
            enriched.assigned_to_user.map(|u| u.username),
            Some("mika".to_string())
        );
    }
}
