//! Payment notification intake.
//!
//! Acknowledgement policy: a valid (or unsigned-but-accepted) notification
//! is always answered 200, even when reconciliation fails, so the processor
//! does not retry storms against a struggling backend; redeliveries are safe
//! because every transition is idempotent. Only a signature mismatch gets a
//! 401.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::processor::signature::verify_signature;
use crate::processor::types::WebhookNotification;

/// POST /webhooks/mercadopago
pub async fn handle_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let payload: JsonValue = serde_json::from_str(&body).unwrap_or(JsonValue::Null);

    let query_topic = query
        .get("type")
        .or_else(|| query.get("topic"))
        .map(String::as_str);
    let query_id = query
        .get("data.id")
        .or_else(|| query.get("id"))
        .map(String::as_str);
    let notification = WebhookNotification::parse(&payload, query_topic, query_id);

    info!(notification = ?notification, "Received payment notification");

    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());
        let request_id = headers.get("x-request-id").and_then(|v| v.to_str().ok());
        // The signed id is the query-string data.id; the body id is only a
        // fallback for test deliveries that omit the query.
        let resource_id = query_id.or_else(|| notification.resource_id());

        let valid = signature
            .map(|sig| verify_signature(secret, sig, resource_id, request_id))
            .unwrap_or(false);
        if !valid {
            warn!("Rejecting notification with missing or invalid signature");
            return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
        }
    } else {
        warn!("Webhook secret not configured, accepting unsigned notification");
    }

    match state.reconciler.reconcile(notification).await {
        Ok(()) => {
            info!("Notification reconciled");
        }
        Err(e) => {
            // Acknowledged anyway; the processor will redeliver and the
            // guarded transitions make the retry safe.
            error!(error = %e, "Notification reconciliation failed");
        }
    }

    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}
