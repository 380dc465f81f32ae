pub mod checkout;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;

use crate::services::{CheckoutService, OrderStateService, ReconcilerService};

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub order_state: Arc<OrderStateService>,
    pub reconciler: Arc<ReconcilerService>,
    /// Shared secret for webhook signature verification; None accepts
    /// unsigned notifications.
    pub webhook_secret: Option<String>,
    pub db_pool: PgPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/checkout", post(checkout::create_checkout))
        .route("/api/discounts/preview", post(checkout::preview_discount))
        .route("/api/orders/{id}/status", get(checkout::order_status))
        .route("/webhooks/mercadopago", post(webhooks::handle_webhook))
        .with_state(state)
}

async fn root() -> &'static str {
    "Titan Race Registration API"
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, (axum::http::StatusCode, String)> {
    match crate::database::health_check(&state.db_pool).await {
        Ok(()) => Ok(axum::Json(serde_json::json!({"status": "healthy"}))),
        Err(e) => Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            format!("Service Unavailable: {}", e),
        )),
    }
}
