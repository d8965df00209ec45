//! Attempt Timeouts
//!
//! Wraps a single model call in a wall-clock bound. An expired attempt is
//! reported as [`DocError::Timeout`], which the generation state machine
//! treats as a transient failure.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout;
//!
//! let text = with_timeout(
//!     Duration::from_secs(120),
//!     service.complete(&prompt, &options),
//!     "completion",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{DocError, Result};

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(DocError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorCategory;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, DocError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires_as_retryable() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, DocError>(42)
            },
            "slow operation",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, DocError::Timeout { .. }));
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> = with_timeout(
            Duration::from_secs(1),
            async { Err(DocError::llm(ErrorCategory::Auth, "denied")) },
            "completion",
        )
        .await;
        assert_eq!(result.unwrap_err().category(), ErrorCategory::Auth);
    }
}
