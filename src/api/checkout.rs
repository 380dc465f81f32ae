use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::services::checkout::{
    CheckoutRequest, CheckoutResponse, DiscountPreviewRequest, DiscountPreviewResponse,
};

/// POST /api/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<CheckoutResponse>)> {
    info!(
        category = %payload.category_id,
        quantity = payload.quantity,
        "Checkout requested"
    );
    let response = state.checkout.checkout(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/discounts/preview
pub async fn preview_discount(
    State(state): State<AppState>,
    Json(payload): Json<DiscountPreviewRequest>,
) -> AppResult<Json<DiscountPreviewResponse>> {
    let response = state.checkout.preview_discount(payload).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub order_id: Uuid,
    pub status: &'static str,
}

/// GET /api/orders/{id}/status
///
/// Payment-pending poll endpoint for the storefront.
pub async fn order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderStatusResponse>> {
    let status = state
        .order_state
        .read_status(id)
        .await?
        .ok_or_else(|| AppError::order_not_found(id.to_string()))?;

    Ok(Json(OrderStatusResponse {
        order_id: id,
        status: status.as_str(),
    }))
}
