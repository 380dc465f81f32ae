use thiserror::Error;

pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Processor API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Invalid processor response: {message}")]
    InvalidResponse { message: String },
}

impl ProcessorError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessorError::ValidationError { .. } => false,
            ProcessorError::NetworkError { .. } => true,
            ProcessorError::RateLimitError { .. } => true,
            ProcessorError::ApiError { retryable, .. } => *retryable,
            ProcessorError::InvalidResponse { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(ProcessorError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!ProcessorError::InvalidResponse {
            message: "truncated body".to_string()
        }
        .is_retryable());
        assert!(ProcessorError::ApiError {
            message: "HTTP 502".to_string(),
            status_code: Some(502),
            retryable: true
        }
        .is_retryable());
    }
}
