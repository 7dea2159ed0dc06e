mod auth;
mod extract;
mod homepage;
mod orders;
mod products;
mod reviews;
mod support;
pub mod uploads;
mod users;

#[cfg(test)]
mod tests;

use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use wbnt_core::app_config::CorsOrigin;

use crate::middleware::{
    enforce_rate_limit, request_id, require_admin, require_customer, require_staff,
    RateLimitState, RequestId, USER_ID_HEADER,
};
use uploads::UploadStore;

// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub uploads: UploadStore,
}

/// Router-level settings that do not belong in request state.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub cors_origin: CorsOrigin,
    pub max_upload_bytes: usize,
}

impl HttpOptions {
    #[must_use]
    pub fn from_app_config(config: &wbnt_core::AppConfig) -> Self {
        Self {
            cors_origin: config.cors_origin.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Public face of an account attached to orders and support threads.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(super) struct UserSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
}

impl UserSummary {
    /// Placeholder for rows whose account no longer exists.
    pub(super) fn unknown() -> Self {
        Self {
            id: None,
            username: "Unknown".to_string(),
            email: String::new(),
        }
    }
}

impl From<&wbnt_db::UserRef> for UserSummary {
    fn from(user: &wbnt_db::UserRef) -> Self {
        Self {
            id: Some(user.id),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "payload_too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(crate) fn map_db_error(request_id: String, error: &wbnt_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

/// Path id parse shared by every `{id}` route; non-numeric ids are a 404.
pub(super) fn parse_id(rid: &str, raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::new(rid, "not_found", format!("{what} not found")))
}

/// Treats absent, empty, and whitespace-only strings alike.
pub(super) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn build_cors(origin: &CorsOrigin) -> CorsLayer {
    let allow_origin = match origin {
        CorsOrigin::Any => AllowOrigin::any(),
        CorsOrigin::Exact(value) => match HeaderValue::from_str(value) {
            Ok(v) => AllowOrigin::exact(v),
            Err(_) => {
                tracing::warn!(origin = %value, "ignoring unparseable CORS origin");
                AllowOrigin::list(std::iter::empty())
            }
        },
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/products", get(products::list_public_products))
        .route("/api/reviews", get(reviews::list_reviews_by_ids))
        .route("/api/homepage", get(homepage::get_homepage))
        .route("/api/auth/me/{id}", get(auth::me))
}

fn auth_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

fn customer_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/orders",
            get(orders::list_my_orders).post(orders::create_order),
        )
        .route("/api/orders/{id}/cancel", patch(orders::cancel_order))
        .route(
            "/api/support/threads",
            get(support::customer::list_threads).post(support::customer::create_thread),
        )
        .route(
            "/api/support/threads/{id}/messages",
            get(support::customer::list_messages).post(support::customer::post_message),
        )
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            state,
            require_customer,
        )))
}

fn staff_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/products",
            get(products::list_admin_products).post(products::create_product),
        )
        .route(
            "/api/admin/products/{id}",
            patch(products::update_product).delete(products::delete_product),
        )
        .route(
            "/api/admin/products/{id}/reviews",
            get(products::list_product_reviews),
        )
        .route("/api/admin/reviews", get(reviews::list_all_reviews))
        .route(
            "/api/admin/homepage",
            get(homepage::get_admin_homepage).patch(homepage::update_section),
        )
        .route("/api/admin/homepage/upload", post(homepage::upload_image))
        .route("/api/admin/orders", get(orders::list_all_orders))
        .route("/api/admin/orders/{id}", patch(orders::update_order_status))
        .route(
            "/api/admin/support/threads",
            get(support::staff::list_threads),
        )
        .route(
            "/api/admin/support/threads/{id}/messages",
            get(support::staff::list_messages).post(support::staff::post_message),
        )
        .route(
            "/api/admin/support/threads/{id}/assign",
            patch(support::staff::assign_thread),
        )
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            state,
            require_staff,
        )))
}

fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/users",
            get(users::list_users).post(users::create_user),
        )
        .route("/api/admin/users/{id}/role", patch(users::update_role))
        .route("/api/admin/users/{id}/status", patch(users::update_status))
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            state,
            require_admin,
        )))
}

pub fn build_app(state: AppState, options: &HttpOptions, auth_rate_limit: RateLimitState) -> Router {
    Router::new()
        .merge(public_router())
        .merge(auth_router(auth_rate_limit))
        .merge(customer_router(state.clone()))
        .merge(staff_router(state.clone()))
        .merge(admin_router(state.clone()))
        .nest_service("/uploads", ServeDir::new(state.uploads.dir()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors(&options.cors_origin))
                .layer(axum::middleware::from_fn(request_id))
                .layer(DefaultBodyLimit::max(
                    options.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
                )),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match wbnt_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[must_use]
pub fn auth_rate_limit_state(config: &wbnt_core::AppConfig) -> RateLimitState {
    RateLimitState::new(
        config.auth_rate_limit,
        Duration::from_secs(config.auth_rate_window_secs),
    )
}
