//! Wire types for the Mercado Pago REST API.
//!
//! Amounts cross this boundary in decimal currency units, as the processor
//! expects; everything inside the crate stays in integer minor units and is
//! converted only at serialization time.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Minor units to decimal currency units, wire boundary only.
pub fn to_currency_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub currency_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub pending: String,
    pub failure: String,
}

/// Hosted-checkout preference creation request.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub external_reference: String,
    pub back_urls: BackUrls,
    pub auto_return: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceResponse {
    pub id: String,
    pub init_point: String,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

/// Authoritative payment resource fetched from `/v1/payments/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentResource {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MerchantOrderPayment {
    pub id: i64,
    pub status: String,
}

/// Merchant order resource; `external_reference` carries our order id and
/// `payments` lists the payment attempts made against the order.
#[derive(Debug, Clone, Deserialize)]
pub struct MerchantOrderResource {
    pub id: i64,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub payments: Vec<MerchantOrderPayment>,
    #[serde(default)]
    pub order_status: Option<String>,
}

/// A webhook notification, classified by topic.
///
/// Mercado Pago delivers two shapes: `{"type":"payment","data":{"id":"..."}}`
/// and `{"topic":"merchant_order","resource":"https://..."}`. Anything else
/// is acknowledged without action so the processor stops redelivering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookNotification {
    Payment { id: String },
    MerchantOrder { resource: String },
    Unrecognized { kind: String },
}

impl WebhookNotification {
    pub fn parse(body: &JsonValue, query_topic: Option<&str>, query_id: Option<&str>) -> Self {
        let kind = body
            .get("type")
            .or_else(|| body.get("topic"))
            .and_then(|v| v.as_str())
            .or(query_topic)
            .unwrap_or("unknown")
            .to_string();

        match kind.as_str() {
            "payment" => {
                // Older deliveries put the id at the top level instead
                // of under `data`.
                let id = body
                    .get("data")
                    .and_then(|d| d.get("id"))
                    .or_else(|| body.get("id"))
                    .map(stringify_id)
                    .or_else(|| query_id.map(|v| v.to_string()));
                match id {
                    Some(id) if !id.is_empty() => WebhookNotification::Payment { id },
                    _ => WebhookNotification::Unrecognized { kind },
                }
            }
            "merchant_order" => {
                // IPN-style deliveries put the merchant-order id in the
                // query string and send no body resource.
                let resource = body
                    .get("resource")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
                    .or_else(|| query_id.map(|v| v.to_string()));
                match resource {
                    Some(resource) if !resource.is_empty() => {
                        WebhookNotification::MerchantOrder { resource }
                    }
                    _ => WebhookNotification::Unrecognized { kind },
                }
            }
            _ => WebhookNotification::Unrecognized { kind },
        }
    }

    /// The `data.id` of the notification, used in signature verification.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            WebhookNotification::Payment { id } => Some(id),
            _ => None,
        }
    }
}

// Payment ids arrive as either a JSON string or a number.
fn stringify_id(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
