//! Payment notification reconciliation.
//!
//! Webhook payloads are treated as hints only. Every notification is
//! dereferenced to the authoritative payment resource before any order
//! transition, so spoofed or stale payloads cannot move an order. Merchant
//! order notifications fan out to their listed payments and go through the
//! same path.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::database::order_repository::OrderRepository;
use crate::error::AppResult;
use crate::processor::types::{PaymentResource, WebhookNotification};
use crate::processor::MercadoPagoClient;
use crate::services::order_state::OrderStateService;

pub struct ReconcilerService {
    orders: Arc<OrderRepository>,
    processor: Arc<MercadoPagoClient>,
    order_state: Arc<OrderStateService>,
}

impl ReconcilerService {
    pub fn new(
        orders: Arc<OrderRepository>,
        processor: Arc<MercadoPagoClient>,
        order_state: Arc<OrderStateService>,
    ) -> Self {
        Self {
            orders,
            processor,
            order_state,
        }
    }

    /// Reconcile one notification end to end. Notifications that reference
    /// nothing we know are logged and dropped; only infrastructure failures
    /// (processor unreachable, database down) surface as errors so the
    /// caller can decide how to acknowledge.
    pub async fn reconcile(&self, notification: WebhookNotification) -> AppResult<()> {
        match notification {
            WebhookNotification::Payment { id } => {
                let payment = self.processor.get_payment(&id).await?;
                self.apply_payment(&payment).await
            }
            WebhookNotification::MerchantOrder { resource } => {
                let merchant_order = self.processor.get_merchant_order(&resource).await?;
                if merchant_order.payments.is_empty() {
                    info!(
                        merchant_order_id = merchant_order.id,
                        "merchant order has no payments yet"
                    );
                    return Ok(());
                }
                for entry in &merchant_order.payments {
                    let payment = self.processor.get_payment(&entry.id.to_string()).await?;
                    self.apply_payment(&payment).await?;
                }
                Ok(())
            }
            WebhookNotification::Unrecognized { kind } => {
                info!(kind = %kind, "ignoring unrecognized notification topic");
                Ok(())
            }
        }
    }

    async fn apply_payment(&self, payment: &PaymentResource) -> AppResult<()> {
        let Some(reference) = payment.external_reference.as_deref() else {
            warn!(
                payment_id = payment.id,
                "payment carries no external reference, skipping"
            );
            return Ok(());
        };
        let Ok(order_id) = Uuid::from_str(reference) else {
            warn!(
                payment_id = payment.id,
                external_reference = %reference,
                "external reference is not an order id, skipping"
            );
            return Ok(());
        };

        let Some(order) = self.orders.find_by_id(order_id).await? else {
            warn!(
                payment_id = payment.id,
                order_id = %order_id,
                "payment references an unknown order, skipping"
            );
            return Ok(());
        };

        let paid_amount = payment
            .transaction_amount
            .map(|amount| (amount * 100.0).round() as i64);
        self.order_state
            .apply_payment_status(
                &order,
                &payment.id.to_string(),
                &payment.status,
                paid_amount,
            )
            .await
    }
}
