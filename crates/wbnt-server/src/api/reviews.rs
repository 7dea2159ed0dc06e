use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use wbnt_core::homepage::parse_id_list;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ReviewIdsQuery {
    pub ids: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewsEnvelope<T: Serialize> {
    pub reviews: Vec<T>,
}

/// GET /api/reviews?ids=1,2,3
///
/// Feeds the homepage "They Trusted Us" strip; an empty or unparseable id
/// list yields an empty array rather than an error.
pub(super) async fn list_reviews_by_ids(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ReviewIdsQuery>,
) -> Result<Json<ApiResponse<ReviewsEnvelope<wbnt_db::ReviewRow>>>, ApiError> {
    let ids = query.ids.as_deref().map(parse_id_list).unwrap_or_default();

    let reviews = wbnt_db::list_reviews_by_ids(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, ReviewsEnvelope { reviews })))
}

/// GET /api/admin/reviews
pub(super) async fn list_all_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ReviewsEnvelope<wbnt_db::ReviewWithProductRow>>>, ApiError> {
    let reviews = wbnt_db::list_all_reviews(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, ReviewsEnvelope { reviews })))
}
