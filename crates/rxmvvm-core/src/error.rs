//! Error types for rxmvvm-core.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// The main error type for fallible rxmvvm-core operations.
#[derive(Debug, thiserror::Error)]
pub enum RxError {
    /// Scheduler-related error.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Virtual-time scheduler errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The task ID is invalid, already executed, or already cancelled.
    #[error("Invalid or expired scheduled task ID")]
    InvalidTaskId,
}

/// A specialized Result type for rxmvvm-core operations.
pub type Result<T> = std::result::Result<T, RxError>;

/// The error carried by a stream's `Error` event.
///
/// Streams are multicast, so the error must be cheap to clone. Any
/// `std::error::Error` is accepted and stored behind an `Arc`; the concrete
/// type can be recovered with [`StreamError::downcast_ref`].
#[derive(Clone)]
pub struct StreamError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl StreamError {
    /// Wrap an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Create an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Attempt to view the wrapped error as a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.downcast_ref::<E>()
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StreamError").field(&self.inner).finish()
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for StreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

// Recorded test events compare errors by their rendered message.
impl PartialEq for StreamError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.to_string() == other.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MessageError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_stream_error_display() {
        assert_eq!(StreamError::msg("boom").to_string(), "boom");
        assert_eq!(StreamError::new(DiskFull).to_string(), "disk full");
    }

    #[test]
    fn test_message_error_has_no_source() {
        let err = StreamError::msg("timeout");
        assert!(err.source().is_none());
        assert_eq!(format!("{err:?}"), format!("{:?}", StreamError::msg("timeout")));
    }

    #[test]
    fn test_stream_error_downcast() {
        let err = StreamError::new(DiskFull);
        assert!(err.downcast_ref::<DiskFull>().is_some());
        assert!(StreamError::msg("x").downcast_ref::<DiskFull>().is_none());
    }

    #[test]
    fn test_stream_error_equality() {
        let err = StreamError::msg("same");
        assert_eq!(err, err.clone());
        assert_eq!(StreamError::msg("same"), StreamError::msg("same"));
        assert_ne!(StreamError::msg("a"), StreamError::msg("b"));
    }

    #[test]
    fn test_scheduler_error_into_rx_error() {
        let err: RxError = SchedulerError::InvalidTaskId.into();
        assert_eq!(
            err.to_string(),
            "Scheduler error: Invalid or expired scheduled task ID"
        );
    }
}
