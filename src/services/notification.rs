use async_trait::async_trait;
use tracing::info;

use crate::catalog::category_by_id;
use crate::database::order_repository::{Order, Participant};

/// Outbound confirmation channel for paid orders.
///
/// The state machine guarantees at most one send per order; implementations
/// only have to deliver.
#[async_trait]
pub trait ConfirmationSender: Send + Sync {
    async fn send_confirmation(&self, order: &Order, participants: &[Participant]);
}

pub struct LogConfirmationSender;

impl LogConfirmationSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogConfirmationSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfirmationSender for LogConfirmationSender {
    async fn send_confirmation(&self, order: &Order, participants: &[Participant]) {
        // Placeholder for real delivery (email / WhatsApp). Structured log
        // carries everything a real sender would need.
        let bibs: Vec<i32> = participants.iter().map(|p| p.bib_number).collect();
        let category_name = category_by_id(&order.category_id)
            .map(|c| c.name)
            .unwrap_or(order.category_id.as_str());
        info!(
            order_id = %order.id,
            category = %category_name,
            grand_total = order.grand_total,
            recipients = participants.len(),
            bibs = ?bibs,
            "🔔 NOTIFICATION: Registration Confirmed"
        );
    }
}
