//! Order submission, try-on approval and lookup.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use serde_json::Value;
use studio_core::order::{
    estimated_delivery, ApprovalRequest, ApprovalResponse, OrderKind, OrderRecord, OrderRequest,
    OrderResponse, TrackingInfo,
};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/submit-order`
pub async fn submit_order(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Json(body) = body?;
    let order = OrderRequest::from_value_lenient(&body);
    let record = state.orders.record(OrderKind::Tailor, body);

    info!(
        order_id = %record.order_id,
        customer = %order.form.full_name,
        contact = %order.form.contact,
        bust = %order.form.bust,
        waist = %order.form.waist,
        hips = %order.form.hips,
        height = %order.form.height,
        weight = %order.form.weight,
        front_design = order.design_images.front.as_deref().unwrap_or("-"),
        back_design = order.design_images.back.as_deref().unwrap_or("-"),
        has_try_on = order.try_on_image.is_some(),
        "New order received"
    );

    Ok(Json(OrderResponse {
        success: true,
        order_id: record.order_id,
        message: "Order submitted successfully to tailor".to_string(),
    }))
}

/// `POST /api/approve-design`
pub async fn approve_design(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let Json(body) = body?;
    let approval = ApprovalRequest::from_value_lenient(&body);
    let record = state.orders.record(OrderKind::Approval, body);
    let delivery = estimated_delivery(Utc::now().date_naive());

    info!(
        order_id = %record.order_id,
        garment = %approval.clothing_attr("type"),
        style = %approval.clothing_attr("style"),
        estimated_delivery = %delivery,
        "Try-on design approved"
    );

    Ok(Json(ApprovalResponse {
        success: true,
        order_id: record.order_id,
        message: "Design approved and order placed successfully!".to_string(),
        estimated_delivery: delivery,
        tracking_info: TrackingInfo::default(),
    }))
}

/// `GET /api/orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderRecord>, ApiError> {
    state
        .orders
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Order not found: {}", id)))
}
