//! Admin-only account management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use wbnt_core::{Role, UserStatus};
use wbnt_db::UserRow;

use crate::middleware::RequestId;

use super::auth::{hash_password, map_account_error, require_account_fields, UserEnvelope};
use super::{extract::ApiJson, map_db_error, non_blank, parse_id, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RoleRequest {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct UsersEnvelope {
    pub users: Vec<UserRow>,
}

/// Role given to staff-created accounts; never admin.
fn parse_assignable_role(raw: Option<&str>) -> Option<Role> {
    match non_blank(raw) {
        None => Some(Role::Buyer),
        Some(value) => value.parse::<Role>().ok().filter(|r| r.is_assignable()),
    }
}

/// The founding admin account cannot be demoted, suspended, or banned.
async fn ensure_not_first_admin(state: &AppState, rid: &str, id: i64) -> Result<(), ApiError> {
    let first_admin = wbnt_db::first_admin_id(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    if first_admin == Some(id) {
        return Err(ApiError::new(
            rid,
            "forbidden",
            "Cannot change the first admin account",
        ));
    }
    Ok(())
}

/// GET /api/admin/users
pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<UsersEnvelope>>, ApiError> {
    let users = wbnt_db::list_users(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, UsersEnvelope { users })))
}

/// POST /api/admin/users
pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserEnvelope>>), ApiError> {
    let rid = &req_id.0;
    let account = require_account_fields(
        rid,
        body.email.as_deref(),
        body.username.as_deref(),
        body.password.as_deref(),
    )?;
    let role = parse_assignable_role(body.role.as_deref()).ok_or_else(|| {
        ApiError::new(rid, "validation_error", "Role must be Moderator or User")
    })?;

    let password_hash = hash_password(rid, account.password).await?;
    let user = wbnt_db::create_user(
        &state.pool,
        account.email,
        account.username,
        &password_hash,
        role.as_str(),
    )
    .await
    .map_err(|e| map_account_error(rid, &e))?;

    tracing::info!(user_id = user.id, role = %role, "admin created account");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, UserEnvelope { user })),
    ))
}

/// PATCH /api/admin/users/{id}/role
pub(super) async fn update_role(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> Result<Json<ApiResponse<UserEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "User")?;

    let role = non_blank(body.role.as_deref())
        .and_then(|r| r.parse::<Role>().ok())
        .filter(|r| r.is_assignable())
        .ok_or_else(|| ApiError::new(rid, "validation_error", "Can only set Moderator or User"))?;

    ensure_not_first_admin(&state, rid, id).await?;

    let user = wbnt_db::update_user_role(&state.pool, id, role.as_str())
        .await
        .map_err(|e| map_account_error(rid, &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "User not found"))?;

    tracing::info!(user_id = user.id, role = %role, "changed account role");

    Ok(Json(ApiResponse::new(req_id.0, UserEnvelope { user })))
}

/// PATCH /api/admin/users/{id}/status
pub(super) async fn update_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<ApiResponse<UserEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "User")?;

    let status = non_blank(body.status.as_deref())
        .and_then(|s| s.parse::<UserStatus>().ok())
        .ok_or_else(|| ApiError::new(rid, "validation_error", "Invalid status"))?;

    ensure_not_first_admin(&state, rid, id).await?;

    let user = wbnt_db::update_user_status(&state.pool, id, status.as_str())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "User not found"))?;

    tracing::info!(user_id = user.id, status = %status, "changed account status");

    Ok(Json(ApiResponse::new(req_id.0, UserEnvelope { user })))
}
