//! Unified error handling for the registration backend.
//!
//! One `AppError` type with HTTP status mapping, stable error codes for
//! client handling, and user-facing messages. Error kinds are matched as
//! values at the HTTP boundary, never by message substring.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pricing::{DiscountRejection, PricingError};
use crate::processor::error::ProcessorError;

/// Stable error codes for programmatic client handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "DISCOUNT_REJECTED")]
    DiscountRejected,
    #[serde(rename = "ZERO_AMOUNT")]
    ZeroAmount,
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "PROCESSOR_UNAVAILABLE")]
    ProcessorUnavailable,
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    /// Malformed or missing checkout input. User-correctable.
    Validation { message: String },
    /// A discount code failed one of its validation rules.
    DiscountRejected(DiscountRejection),
    /// Computed payable amount was zero or negative. A catalog
    /// misconfiguration, not a user error.
    ZeroAmount,
    /// Order id did not resolve to a known order.
    OrderNotFound { order_id: String },
    /// Database failure. Surfaces as a generic message.
    Database { message: String },
    /// Outbound call to the payment processor failed. The checkout is safe
    /// to retry as a whole.
    Processor {
        message: String,
        is_retryable: bool,
    },
    /// Webhook signature verification failed.
    Unauthorized,
    Internal { message: String },
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self { kind }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation {
            message: message.into(),
        })
    }

    pub fn order_not_found(order_id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::OrderNotFound {
            order_id: order_id.into(),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Internal {
            message: message.into(),
        })
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => StatusCode::BAD_REQUEST,
            AppErrorKind::DiscountRejected(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::ZeroAmount => StatusCode::BAD_REQUEST,
            AppErrorKind::OrderNotFound { .. } => StatusCode::NOT_FOUND,
            AppErrorKind::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            // Retryable failures are timeouts and transient upstream
            // outages; everything else is a bad upstream response.
            AppErrorKind::Processor { is_retryable, .. } => {
                if *is_retryable {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            AppErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            AppErrorKind::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => ErrorCode::ValidationError,
            AppErrorKind::DiscountRejected(_) => ErrorCode::DiscountRejected,
            AppErrorKind::ZeroAmount => ErrorCode::ZeroAmount,
            AppErrorKind::OrderNotFound { .. } => ErrorCode::OrderNotFound,
            AppErrorKind::Database { .. } => ErrorCode::DatabaseError,
            AppErrorKind::Processor { .. } => ErrorCode::ProcessorUnavailable,
            AppErrorKind::Unauthorized => ErrorCode::Unauthorized,
            AppErrorKind::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// User-facing message. Validation and discount rejections carry their
    /// specific reason; infrastructure failures stay generic.
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Validation { message } => message.clone(),
            AppErrorKind::DiscountRejected(rejection) => rejection.to_string(),
            AppErrorKind::ZeroAmount => {
                "Order total is zero. Registration prices are not configured yet".to_string()
            }
            AppErrorKind::OrderNotFound { order_id } => {
                format!("Order '{}' not found", order_id)
            }
            AppErrorKind::Database { .. } => {
                "Could not create the order. Please try again later".to_string()
            }
            AppErrorKind::Processor { is_retryable, .. } => {
                if *is_retryable {
                    "The payment provider is temporarily unavailable. Please try again".to_string()
                } else {
                    "Payment checkout could not be started. Please try again later".to_string()
                }
            }
            AppErrorKind::Unauthorized => "Invalid signature".to_string(),
            AppErrorKind::Internal { .. } => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Database { .. } => true,
            AppErrorKind::Processor { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.user_message(),
            code: self.error_code(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Discount(rejection) => {
                AppError::new(AppErrorKind::DiscountRejected(rejection))
            }
            PricingError::ZeroAmount => AppError::new(AppErrorKind::ZeroAmount),
        }
    }
}

impl From<ProcessorError> for AppError {
    fn from(err: ProcessorError) -> Self {
        AppError::new(AppErrorKind::Processor {
            is_retryable: err.is_retryable(),
            message: err.to_string(),
        })
    }
}

impl From<crate::database::error::DatabaseError> for AppError {
    fn from(err: crate::database::error::DatabaseError) -> Self {
        AppError::new(AppErrorKind::Database {
            message: err.to_string(),
        })
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_maps_to_400_with_specific_message() {
        let error = AppError::validation("Participant phone number is invalid");
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert_eq!(error.user_message(), "Participant phone number is invalid");
        assert!(!error.is_retryable());
    }

    #[test]
    fn discount_rejection_keeps_its_reason() {
        let error = AppError::new(AppErrorKind::DiscountRejected(DiscountRejection::Expired));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.error_code(), ErrorCode::DiscountRejected);
        assert!(error.user_message().contains("expired"));
    }

    #[test]
    fn database_error_hides_detail() {
        let error = AppError::new(AppErrorKind::Database {
            message: "connection refused on 10.0.0.3".to_string(),
        });
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!error.user_message().contains("10.0.0.3"));
        assert!(error.is_retryable());
    }

    #[test]
    fn processor_failure_is_5xx_and_retryable() {
        let error = AppError::new(AppErrorKind::Processor {
            message: "timeout".to_string(),
            is_retryable: true,
        });
        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error.error_code(), ErrorCode::ProcessorUnavailable);
        assert!(error.is_retryable());
    }
}
