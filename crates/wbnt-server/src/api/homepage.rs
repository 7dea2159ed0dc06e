//! Homepage marketing sections and their image uploads.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wbnt_core::homepage::{assemble, decode_content};

use crate::middleware::RequestId;

use super::uploads::multipart_error;
use super::{extract::ApiJson, map_db_error, non_blank, ApiError, ApiResponse, AppState};

const IMAGE_FIELD: &str = "image";

#[derive(Debug, Deserialize)]
pub(super) struct UpdateSectionRequest {
    pub section_key: Option<String>,
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Serialize)]
pub(super) struct HomepageEnvelope {
    pub content: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub(super) struct SectionEnvelope {
    pub section_key: String,
    pub content: Value,
}

#[derive(Debug, Serialize)]
pub(super) struct UploadEnvelope {
    pub filename: String,
}

async fn load_homepage(state: &AppState, rid: &str) -> Result<HomepageEnvelope, ApiError> {
    let rows = wbnt_db::list_sections(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    let content = assemble(rows.into_iter().map(|row| (row.section_key, row.content)));
    Ok(HomepageEnvelope { content })
}

/// GET /api/homepage
pub(super) async fn get_homepage(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<HomepageEnvelope>>, ApiError> {
    let envelope = load_homepage(&state, &req_id.0).await?;
    Ok(Json(ApiResponse::new(req_id.0, envelope)))
}

/// GET /api/admin/homepage
pub(super) async fn get_admin_homepage(
    state: State<AppState>,
    req_id: Extension<RequestId>,
) -> Result<Json<ApiResponse<HomepageEnvelope>>, ApiError> {
    get_homepage(state, req_id).await
}

/// PATCH /api/admin/homepage
pub(super) async fn update_section(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<UpdateSectionRequest>,
) -> Result<Json<ApiResponse<SectionEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let key = non_blank(body.section_key.as_deref())
        .ok_or_else(|| ApiError::new(rid, "validation_error", "section_key is required"))?;

    let row = wbnt_db::upsert_section(&state.pool, key, &body.content)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(section = %row.section_key, "updated homepage section");

    Ok(Json(ApiResponse::new(
        req_id.0,
        SectionEnvelope {
            content: decode_content(&row.content),
            section_key: row.section_key,
        },
    )))
}

/// POST /api/admin/homepage/upload
pub(super) async fn upload_image(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UploadEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let mut multipart =
        multipart.map_err(|e| ApiError::new(rid, "bad_request", e.body_text()))?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(rid, &e))?
    {
        let is_file = field.name() == Some(IMAGE_FIELD)
            && field.file_name().is_some_and(|f| !f.is_empty());
        if is_file && image.is_none() {
            image = Some(state.uploads.read_field(rid, field).await?);
        }
    }

    let image =
        image.ok_or_else(|| ApiError::new(rid, "bad_request", "No image file provided"))?;
    let filename = state.uploads.save(rid, &image).await?;

    Ok(Json(ApiResponse::new(req_id.0, UploadEnvelope { filename })))
}
