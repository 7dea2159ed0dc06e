//! Catalog handlers: the public storefront list and staff product management.

mod form;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use wbnt_core::{catalog::DEFAULT_SIZE, checkout::parse_leading_int, ProductStatus};
use wbnt_db::{NewProduct, ProductPatch, ProductRow, ReviewRow};

use crate::middleware::RequestId;

use self::form::{parse_product_input, ProductForm};
use super::{map_db_error, parse_id, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ProductListQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductsEnvelope {
    pub products: Vec<ProductRow>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductEnvelope {
    pub product: ProductRow,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductReviewsEnvelope {
    pub product: ProductRow,
    pub reviews: Vec<ReviewRow>,
}

async fn fetch_product(state: &AppState, rid: &str, id: i64) -> Result<ProductRow, ApiError> {
    wbnt_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "Product not found"))
}

/// GET /api/products?limit=N
pub(super) async fn list_public_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<ProductsEnvelope>>, ApiError> {
    let limit = query
        .limit
        .as_deref()
        .and_then(parse_leading_int)
        .filter(|l| *l > 0);

    let products = wbnt_db::list_products(&state.pool, limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, ProductsEnvelope { products })))
}

/// GET /api/admin/products
pub(super) async fn list_admin_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ProductsEnvelope>>, ApiError> {
    let products = wbnt_db::list_products(&state.pool, None)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, ProductsEnvelope { products })))
}

/// POST /api/admin/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    form: ProductForm,
) -> Result<(StatusCode, Json<ApiResponse<ProductEnvelope>>), ApiError> {
    let rid = &req_id.0;
    let input = parse_product_input(rid, &form.fields)?;

    let (Some(name), Some(price)) = (input.name.as_deref().filter(|n| !n.is_empty()), input.price)
    else {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "Name and price are required",
        ));
    };

    let image = match form.image {
        Some(ref image) => Some(state.uploads.save(rid, image).await?),
        None => None,
    };

    let created = wbnt_db::create_product(
        &state.pool,
        &NewProduct {
            name,
            price,
            size: input.size.as_deref().unwrap_or(DEFAULT_SIZE),
            status: input.status.unwrap_or(ProductStatus::Available).as_str(),
            category: input.category.as_ref().and_then(Option::as_deref),
            rating: input.rating.unwrap_or(0.0),
            review_count: input.review_count.unwrap_or(0),
            description: input.description.as_ref().and_then(Option::as_deref),
            image: image.as_deref(),
        },
    )
    .await;

    let product = match created {
        Ok(product) => product,
        Err(e) => {
            if let Some(ref filename) = image {
                state.uploads.remove(filename).await;
            }
            return Err(map_db_error(rid.clone(), &e));
        }
    };

    tracing::info!(product_id = product.id, "created product");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, ProductEnvelope { product })),
    ))
}

/// PATCH /api/admin/products/{id}
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    form: ProductForm,
) -> Result<Json<ApiResponse<ProductEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "Product")?;
    let existing = fetch_product(&state, rid, id).await?;
    let input = parse_product_input(rid, &form.fields)?;

    if input.name.as_deref().is_some_and(str::is_empty) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "name must not be empty",
        ));
    }

    let mut patch = ProductPatch {
        name: input.name,
        price: input.price,
        size: input.size,
        status: input.status.map(|s| s.as_str().to_owned()),
        category: input.category,
        rating: input.rating,
        review_count: input.review_count,
        description: input.description,
        image: None,
    };

    if patch.is_empty() && form.image.is_none() {
        return Err(ApiError::new(rid, "bad_request", "No fields to update"));
    }

    if let Some(ref image) = form.image {
        patch.image = Some(state.uploads.save(rid, image).await?);
    }

    let updated = match wbnt_db::update_product(&state.pool, id, &patch).await {
        Ok(row) => row,
        Err(e) => {
            if let Some(ref filename) = patch.image {
                state.uploads.remove(filename).await;
            }
            return Err(map_db_error(rid.clone(), &e));
        }
    };
    let product =
        updated.ok_or_else(|| ApiError::new(rid, "not_found", "Product not found"))?;

    if patch.image.is_some() {
        if let Some(ref old) = existing.image {
            state.uploads.remove(old).await;
        }
    }

    tracing::info!(product_id = product.id, "updated product");

    Ok(Json(ApiResponse::new(req_id.0, ProductEnvelope { product })))
}

/// DELETE /api/admin/products/{id}
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "Product")?;

    let deleted = wbnt_db::delete_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "Product not found"))?;

    if let Some(ref image) = deleted.image {
        state.uploads.remove(image).await;
    }

    tracing::info!(product_id = id, "deleted product");

    Ok(Json(ApiResponse::new(
        req_id.0,
        serde_json::json!({ "success": true }),
    )))
}

/// GET /api/admin/products/{id}/reviews
pub(super) async fn list_product_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductReviewsEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "Product")?;
    let product = fetch_product(&state, rid, id).await?;

    let reviews = wbnt_db::list_reviews_for_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        ProductReviewsEnvelope { product, reviews },
    )))
}
