//! Registration, login, and session lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use wbnt_core::Role;
use wbnt_db::{DbError, UserRow};

use crate::middleware::RequestId;

use super::{extract::ApiJson, map_db_error, non_blank, parse_id, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct UserEnvelope {
    pub user: UserRow,
}

/// Validated account fields shared by self-registration and admin user creation.
pub(super) struct NewAccount<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

pub(super) fn require_account_fields<'a>(
    rid: &str,
    email: Option<&'a str>,
    username: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<NewAccount<'a>, ApiError> {
    match (
        non_blank(email),
        non_blank(username),
        password.filter(|p| !p.is_empty()),
    ) {
        (Some(email), Some(username), Some(password)) => Ok(NewAccount {
            email,
            username,
            password,
        }),
        _ => Err(ApiError::new(
            rid,
            "validation_error",
            "Email, username, and password are required",
        )),
    }
}

/// Argon2 is CPU-bound; keep it off the async workers.
pub(super) async fn hash_password(rid: &str, password: &str) -> Result<String, ApiError> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || wbnt_core::hash_password(&password)).await;
    match hashed {
        Ok(Ok(hash)) => Ok(hash),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "password hashing failed");
            Err(ApiError::new(rid, "internal_error", "password hashing failed"))
        }
        Err(e) => {
            tracing::error!(error = %e, "password hashing task failed");
            Err(ApiError::new(rid, "internal_error", "password hashing failed"))
        }
    }
}

/// Map account insert failures: uniqueness and the single-admin rule are 409s.
pub(super) fn map_account_error(rid: &str, error: &DbError) -> ApiError {
    match error {
        DbError::Duplicate => ApiError::new(rid, "conflict", "Email or username already exists"),
        DbError::AdminConstraint(message) => ApiError::new(rid, "conflict", message.clone()),
        other => map_db_error(rid.to_owned(), other),
    }
}

/// POST /api/auth/register
pub(super) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserEnvelope>>), ApiError> {
    let rid = &req_id.0;
    let account = require_account_fields(
        rid,
        body.email.as_deref(),
        body.username.as_deref(),
        body.password.as_deref(),
    )?;

    let role = match non_blank(body.role.as_deref()) {
        None => Role::Buyer,
        Some(raw) => raw.parse::<Role>().map_err(|_| {
            ApiError::new(
                rid,
                "validation_error",
                "Invalid role. Must be: admin, mod, or buyer",
            )
        })?,
    };

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

    tracing::info!(user_id = user.id, role = %role, "registered account");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, UserEnvelope { user })),
    ))
}

/// POST /api/auth/login
pub(super) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<UserEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let (Some(email), Some(password)) = (
        non_blank(body.email.as_deref()),
        body.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "Email and password are required",
        ));
    };

    let invalid = || ApiError::new(rid, "unauthorized", "Invalid email or password");

    let credentials = wbnt_db::get_credentials_by_email(&state.pool, email)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(invalid)?;

    match credentials.status.as_str() {
        "banned" => {
            return Err(ApiError::new(
                rid,
                "forbidden",
                "Your account has been banned",
            ))
        }
        "suspended" => {
            return Err(ApiError::new(
                rid,
                "forbidden",
                "Your account has been suspended",
            ))
        }
        _ => {}
    }

    let stored = credentials.password_hash.clone();
    let password = password.to_owned();
    let verified =
        tokio::task::spawn_blocking(move || wbnt_core::verify_password(&password, &stored)).await;
    match verified {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => return Err(invalid()),
        Ok(Err(e)) => {
            tracing::error!(error = %e, user_id = credentials.id, "stored password hash unusable");
            return Err(ApiError::new(rid, "internal_error", "login failed"));
        }
        Err(e) => {
            tracing::error!(error = %e, "password verification task failed");
            return Err(ApiError::new(rid, "internal_error", "login failed"));
        }
    }

    Ok(Json(ApiResponse::new(
        req_id.0.clone(),
        UserEnvelope {
            user: credentials.into_user(),
        },
    )))
}

/// GET /api/auth/me/{id}
pub(super) async fn me(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "User")?;

    let user = wbnt_db::get_user(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "User not found"))?;

    Ok(Json(ApiResponse::new(req_id.0.clone(), UserEnvelope { user })))
}
