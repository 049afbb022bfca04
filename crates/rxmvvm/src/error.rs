//! Error types for view models and their services.

use rxmvvm_core::StreamError;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors an [`ApiService`](crate::ApiService) fetch can fail with.
///
/// View models absorb every variant the same way; the distinction exists
/// for services and their callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request could not be completed.
    #[error("Request failed: {0}")]
    Request(String),

    /// The service answered with no items.
    #[error("Service returned an empty response")]
    EmptyResponse,

    /// The service was asked to fetch with nothing scripted.
    #[error("No scripted responses configured")]
    NotScripted,
}

impl ApiError {
    /// Create a request error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }
}

impl From<ApiError> for StreamError {
    fn from(error: ApiError) -> Self {
        StreamError::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ApiError::request("timed out").to_string(),
            "Request failed: timed out"
        );
        assert_eq!(
            ApiError::EmptyResponse.to_string(),
            "Service returned an empty response"
        );
    }

    #[test]
    fn test_into_stream_error_keeps_source() {
        let error: StreamError = ApiError::EmptyResponse.into();
        assert_eq!(error.downcast_ref::<ApiError>(), Some(&ApiError::EmptyResponse));
        assert_eq!(error.to_string(), "Service returned an empty response");
    }
}
