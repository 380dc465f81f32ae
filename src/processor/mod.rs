//! Payment processor integration (Mercado Pago).

pub mod client;
pub mod error;
pub mod signature;
pub mod types;

pub use client::MercadoPagoClient;
pub use error::{ProcessorError, ProcessorResult};
pub use types::WebhookNotification;
