//! Order lifecycle: PENDING -> PAID | FAILED.
//!
//! Transitions are driven by authoritative processor statuses and enforced
//! with guarded updates in the repository, so concurrent webhook deliveries
//! for the same payment collapse to one effective transition. The paid-side
//! effects (discount usage, confirmation send) run only on the delivery that
//! won the guarded update.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::database::discount_repository::DiscountRepository;
use crate::database::order_repository::{Order, OrderRepository};
use crate::error::AppResult;
use crate::services::notification::ConfirmationSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(OrderStatus::Pending),
            "PAID" => Some(OrderStatus::Paid),
            "FAILED" => Some(OrderStatus::Failed),
            _ => None,
        }
    }
}

/// What a processor payment status means for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Paid,
    Failed,
    None,
}

/// Map a raw processor status to a lifecycle transition. Unmapped statuses
/// (in_process, pending, authorized, ...) leave the order pending; the raw
/// status is still recorded for audit.
pub fn map_processor_status(status: &str) -> Transition {
    match status {
        "approved" | "completed" => Transition::Paid,
        "rejected" | "cancelled" | "refunded" | "charged_back" => Transition::Failed,
        _ => Transition::None,
    }
}

pub struct OrderStateService {
    orders: Arc<OrderRepository>,
    discounts: Arc<DiscountRepository>,
    confirmations: Arc<dyn ConfirmationSender>,
}

impl OrderStateService {
    pub fn new(
        orders: Arc<OrderRepository>,
        discounts: Arc<DiscountRepository>,
        confirmations: Arc<dyn ConfirmationSender>,
    ) -> Self {
        Self {
            orders,
            discounts,
            confirmations,
        }
    }

    /// Apply an authoritative payment status to an order. Idempotent: any
    /// redelivery after the first effective transition is a no-op.
    ///
    /// `paid_amount` is the amount the processor reports, in minor units. A
    /// mismatch against the order's grand total never blocks the transition;
    /// it is logged and flagged in the audit status.
    pub async fn apply_payment_status(
        &self,
        order: &Order,
        payment_id: &str,
        raw_status: &str,
        paid_amount: Option<i64>,
    ) -> AppResult<()> {
        let mut audit_status = raw_status.to_string();
        if let Some(paid) = paid_amount {
            if paid != order.grand_total {
                warn!(
                    order_id = %order.id,
                    payment_id = %payment_id,
                    expected = order.grand_total,
                    paid,
                    "paid amount does not match order total"
                );
                audit_status = format!("{} (amount_mismatch)", raw_status);
            }
        }
        let audit_status = audit_status.as_str();

        match map_processor_status(raw_status) {
            Transition::Paid => {
                let won = self
                    .orders
                    .transition_to_paid(order.id, payment_id, audit_status)
                    .await?;
                if won {
                    info!(
                        order_id = %order.id,
                        payment_id = %payment_id,
                        "order transitioned to PAID"
                    );
                    self.run_paid_side_effects(order).await;
                } else {
                    info!(
                        order_id = %order.id,
                        payment_id = %payment_id,
                        "order already PAID, duplicate delivery ignored"
                    );
                }
            }
            Transition::Failed => {
                let moved = self
                    .orders
                    .mark_failed(order.id, payment_id, audit_status)
                    .await?;
                if moved {
                    info!(
                        order_id = %order.id,
                        payment_id = %payment_id,
                        status = %raw_status,
                        "order transitioned to FAILED"
                    );
                }
            }
            Transition::None => {
                self.orders
                    .record_processor_status(order.id, payment_id, audit_status)
                    .await?;
                info!(
                    order_id = %order.id,
                    payment_id = %payment_id,
                    status = %raw_status,
                    "processor status recorded, order stays PENDING"
                );
            }
        }
        Ok(())
    }

    /// Side effects that must run exactly once per paid order. The `PAID`
    /// transition gate already serialized us; this is the only executor.
    /// Each effect is independent: a failure is logged and must not stop
    /// the others, because the winning delivery is the only chance to run
    /// them (redeliveries lose the guard and skip this path).
    async fn run_paid_side_effects(&self, order: &Order) {
        if let Some(discount_id) = order.discount_code_id {
            match self.discounts.increment_usage(discount_id).await {
                Ok(true) => {}
                Ok(false) => {
                    // Cap was reached between checkout and payment. The
                    // order keeps its price; the counter just cannot
                    // overshoot.
                    warn!(
                        order_id = %order.id,
                        discount_id = %discount_id,
                        "discount usage cap reached, increment skipped"
                    );
                }
                Err(e) => {
                    warn!(
                        order_id = %order.id,
                        discount_id = %discount_id,
                        error = %e,
                        "discount usage increment failed"
                    );
                }
            }
        }

        // Send first, stamp after: `confirmation_sent_at` is the marker
        // operational tooling uses to find orders whose confirmation needs
        // a manual resend, so it must only be set once delivery happened.
        if order.confirmation_sent_at.is_some() {
            return;
        }
        match self.orders.participants_for_order(order.id).await {
            Ok(participants) => {
                self.confirmations
                    .send_confirmation(order, &participants)
                    .await;
                if let Err(e) = self.orders.stamp_confirmation_sent(order.id).await {
                    warn!(
                        order_id = %order.id,
                        error = %e,
                        "confirmation sent but marker could not be stamped"
                    );
                }
            }
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    error = %e,
                    "could not load participants, confirmation not sent"
                );
            }
        }
    }

    pub async fn read_status(&self, order_id: Uuid) -> AppResult<Option<OrderStatus>> {
        let raw = self.orders.read_status(order_id).await?;
        Ok(raw.as_deref().and_then(OrderStatus::from_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Failed] {
            assert_eq!(OrderStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::from_str("REFUNDED"), None);
    }

    #[test]
    fn processor_status_mapping() {
        assert_eq!(map_processor_status("approved"), Transition::Paid);
        assert_eq!(map_processor_status("completed"), Transition::Paid);
        assert_eq!(map_processor_status("rejected"), Transition::Failed);
        assert_eq!(map_processor_status("cancelled"), Transition::Failed);
        assert_eq!(map_processor_status("refunded"), Transition::Failed);
        assert_eq!(map_processor_status("charged_back"), Transition::Failed);
        assert_eq!(map_processor_status("in_process"), Transition::None);
        assert_eq!(map_processor_status("pending"), Transition::None);
        assert_eq!(map_processor_status(""), Transition::None);
    }
}
