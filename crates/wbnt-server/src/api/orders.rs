//! Checkout, buyer order history, and staff fulfilment.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use wbnt_core::{
    checkout::{price_cart, CartLine, PriceQuote},
    OrderStatus, ProductStatus,
};
use wbnt_db::{NewOrderLine, OrderItemRow, OrderRow};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    extract::ApiJson, map_db_error, non_blank, parse_id, ApiError, ApiResponse, AppState,
    UserSummary,
};

#[derive(Debug, Deserialize)]
pub(super) struct CreateOrderRequest {
    pub shipping_address: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub items: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderEnvelope<T: Serialize> {
    pub order: T,
}

#[derive(Debug, Serialize)]
pub(super) struct OrdersEnvelope {
    pub orders: Vec<OrderDetail>,
}

/// Attach each order's items, preserving the order of `orders`.
async fn with_items(
    state: &AppState,
    rid: &str,
    orders: Vec<OrderRow>,
) -> Result<Vec<OrderDetail>, ApiError> {
    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let items = wbnt_db::list_items_for_orders(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let mut by_order: HashMap<i64, Vec<OrderItemRow>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderDetail {
            items: by_order.remove(&order.id).unwrap_or_default(),
            order,
            user: None,
        })
        .collect())
}

async fn customer_directory(
    state: &AppState,
    rid: &str,
) -> Result<HashMap<i64, UserSummary>, ApiError> {
    let users = wbnt_db::list_user_refs(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    Ok(users.iter().map(|u| (u.id, UserSummary::from(u))).collect())
}

/// Attach items and the customer, as the staff order views show them.
async fn staff_view(
    state: &AppState,
    rid: &str,
    orders: Vec<OrderRow>,
) -> Result<Vec<OrderDetail>, ApiError> {
    let customers = customer_directory(state, rid).await?;
    let mut orders = with_items(state, rid, orders).await?;
    for detail in &mut orders {
        detail.user = Some(
            customers
                .get(&detail.order.user_id)
                .cloned()
                .unwrap_or_else(UserSummary::unknown),
        );
    }
    Ok(orders)
}

/// POST /api/orders
pub(super) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderEnvelope<OrderRow>>>), ApiError> {
    let rid = &req_id.0;
    let (Some(shipping_address), Some(payment_method)) = (
        non_blank(body.shipping_address.as_deref()),
        non_blank(body.payment_method.as_deref()),
    ) else {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "Shipping address and payment method are required",
        ));
    };
    if body.items.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "Order must contain at least one item",
        ));
    }

    let ids: Vec<i64> = body.items.iter().map(|line| line.product_id).collect();
    let quotes: HashMap<i64, PriceQuote> = wbnt_db::price_quotes(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .into_iter()
        .filter_map(|(product_id, price, status)| {
            // Rows with an unrecognised status are treated as unavailable.
            let status = status.parse::<ProductStatus>().ok()?;
            Some((
                product_id,
                PriceQuote {
                    product_id,
                    price,
                    status,
                },
            ))
        })
        .collect();

    let priced = price_cart(&body.items, |id| quotes.get(&id).copied())
        .map_err(|e| ApiError::new(rid, "validation_error", e.to_string()))?;
    if priced.is_empty() {
        return Err(ApiError::new(
            rid,
            "bad_request",
            "No valid items to order",
        ));
    }

    let lines: Vec<NewOrderLine> = priced
        .lines
        .iter()
        .map(|line| NewOrderLine {
            product_id: line.product_id,
            quantity: line.quantity,
            price_at_time: line.price_at_time,
        })
        .collect();

    let order = wbnt_db::create_order(
        &state.pool,
        user.id,
        shipping_address,
        payment_method,
        &lines,
        priced.total_amount,
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        order_id = order.id,
        user_id = user.id,
        lines = lines.len(),
        total = order.total_amount,
        "order placed"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, OrderEnvelope { order })),
    ))
}

/// GET /api/orders
pub(super) async fn list_my_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<OrdersEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let orders = wbnt_db::list_orders_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let orders = with_items(&state, rid, orders).await?;

    Ok(Json(ApiResponse::new(req_id.0, OrdersEnvelope { orders })))
}

/// PATCH /api/orders/{id}/cancel
pub(super) async fn cancel_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderEnvelope<OrderDetail>>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "Order")?;

    let order = wbnt_db::get_order(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "Order not found"))?;

    if order.user_id != user.id {
        return Err(ApiError::new(rid, "forbidden", "Access denied"));
    }

    let cancellable = order
        .status
        .parse::<OrderStatus>()
        .is_ok_and(OrderStatus::is_cancellable_by_buyer);
    if !cancellable {
        return Err(ApiError::new(
            rid,
            "bad_request",
            "Only pending or processing orders can be cancelled",
        ));
    }

    let cancelled = wbnt_db::update_order_status(&state.pool, id, OrderStatus::Cancelled.as_str())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "Order not found"))?;

    tracing::info!(order_id = id, user_id = user.id, "order cancelled by buyer");

    let order = with_items(&state, rid, vec![cancelled])
        .await?
        .pop()
        .ok_or_else(|| ApiError::new(rid, "not_found", "Order not found"))?;

    Ok(Json(ApiResponse::new(req_id.0, OrderEnvelope { order })))
}

/// GET /api/admin/orders
pub(super) async fn list_all_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<OrdersEnvelope>>, ApiError> {
    let rid = &req_id.0;
    let orders = wbnt_db::list_all_orders(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let orders = staff_view(&state, rid, orders).await?;

    Ok(Json(ApiResponse::new(req_id.0, OrdersEnvelope { orders })))
}

/// PATCH /api/admin/orders/{id}
pub(super) async fn update_order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<ApiResponse<OrderEnvelope<OrderDetail>>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "Order")?;

    let status = non_blank(body.status.as_deref())
        .and_then(|s| s.parse::<OrderStatus>().ok())
        .ok_or_else(|| {
            ApiError::new(
                rid,
                "validation_error",
                "Valid status required: pending, processing, shipped, delivered, cancelled",
            )
        })?;

    let order = wbnt_db::update_order_status(&state.pool, id, status.as_str())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "Order not found"))?;

    tracing::info!(order_id = id, status = %status, "order status changed");

    let order = staff_view(&state, rid, vec![order])
        .await?
        .pop()
        .ok_or_else(|| ApiError::new(rid, "not_found", "Order not found"))?;

    Ok(Json(ApiResponse::new(req_id.0, OrderEnvelope { order })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_body_tolerates_missing_items() {
        let body: CreateOrderRequest =
            serde_json::from_str(r#"{"shipping_address":"Manila","payment_method":"cod"}"#)
                .expect("parse");
        assert!(body.items.is_empty());
    }

    #[test]
    fn cart_lines_accept_string_quantities() {
        let body: CreateOrderRequest = serde_json::from_str(
            r#"{"items":[{"product_id":4,"quantity":"2"},{"product_id":5}]}"#,
        )
        .expect("parse");
        assert_eq!(body.items.len(), 2);
        assert!(body.items[1].quantity.is_none());
    }
}
