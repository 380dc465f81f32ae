pub mod checkout;
pub mod notification;
pub mod order_state;
pub mod reconciler;

pub use checkout::CheckoutService;
pub use notification::{ConfirmationSender, LogConfirmationSender};
pub use order_state::OrderStateService;
pub use reconciler::ReconcilerService;
