//! Unified Error Type System
//!
//! Centralized error types for the whole pipeline.
//! Classifies model-service failures so the generation state machine can
//! decide between retrying and failing fast.
//!
//! ## Error Categories
//!
//! - **RateLimit**: service throttling (wait and retry)
//! - **Timeout**: attempt exceeded its wall-clock bound (retry)
//! - **MalformedResponse**: empty, unparseable or rejected completion (retry)
//! - **Transient** / **Network**: server-side or connectivity issues (retry with backoff)
//! - **Auth**: credentials rejected (fail fast)
//! - **BadRequest**: prompt permanently unsupported by the service (fail fast)

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Failure modes surfaced across the model service boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Attempt timed out
    Timeout,
    /// Completion was empty, unparseable or failed validation
    MalformedResponse,
    /// Authentication failed - never retried
    Auth,
    /// Request rejected as permanently invalid - never retried
    BadRequest,
    /// Network/connectivity issues
    Network,
    /// Temporary server issues
    Transient,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::MalformedResponse => write!(f, "MALFORMED_RESPONSE"),
            Self::Auth => write!(f, "AUTH"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Network => write!(f, "NETWORK"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category feeds the retry path
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Auth | Self::BadRequest)
    }

    /// Get recommended retry delay for this category
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(30),
            Self::Network => Duration::from_secs(5),
            Self::Transient => Duration::from_secs(2),
            Self::Timeout | Self::MalformedResponse => Duration::from_secs(1),
            _ => Duration::from_millis(500),
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Model service error with category, context, and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Service that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if the service sent one)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Service hint if present, otherwise the category default
    pub fn recommended_delay(&self) -> Duration {
        self.retry_after
            .unwrap_or_else(|| self.category.recommended_delay())
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw service failures onto [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a free-form error message from any service
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30));
        }

        if lower.contains("auth")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("invalid key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
        {
            return LlmError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("timeout") || lower.contains("timed out") {
            return LlmError::with_provider(ErrorCategory::Timeout, message, provider);
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("unreachable")
        {
            return LlmError::with_provider(ErrorCategory::Network, message, provider)
                .retry_after(Duration::from_secs(5));
        }

        // Context overflow is permanent for a given prompt
        if lower.contains("context length")
            || lower.contains("context too long")
            || lower.contains("400")
            || lower.contains("bad request")
            || lower.contains("unsupported")
        {
            return LlmError::with_provider(ErrorCategory::BadRequest, message, provider);
        }

        if lower.contains("parse")
            || lower.contains("json")
            || lower.contains("malformed")
            || lower.contains("empty response")
            || lower.contains("no content")
        {
            return LlmError::with_provider(ErrorCategory::MalformedResponse, message, provider)
                .retry_after(Duration::from_secs(1));
        }

        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("500")
            || lower.contains("service unavailable")
            || lower.contains("server error")
            || lower.contains("overloaded")
            || lower.contains("temporary")
        {
            return LlmError::with_provider(ErrorCategory::Transient, message, provider)
                .retry_after(Duration::from_secs(2));
        }

        LlmError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 | 404 | 413 | 422 => {
                LlmError::with_provider(ErrorCategory::BadRequest, message, provider)
            }
            408 => LlmError::with_provider(ErrorCategory::Timeout, message, provider),
            500 | 502 | 503 | 504 => {
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            _ => Self::classify(message, provider),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum DocError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File walk error: {0}")]
    Walk(#[from] ignore::Error),

    // -------------------------------------------------------------------------
    // Model Service Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported language for {path}")]
    UnsupportedLanguage { path: String },

    #[error("Parse error in {path} at {line}:{column}: {message}")]
    Parse {
        path: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("Evaluation input error: {0}")]
    EvaluationInput(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<LlmError> for DocError {
    fn from(err: LlmError) -> Self {
        DocError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, DocError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl DocError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn llm(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Llm(LlmError::new(category, message))
    }

    pub fn parse(path: impl Into<String>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Category as seen by the retry state machine
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Llm(e) => e.category,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Json(_) => ErrorCategory::MalformedResponse,
            Self::Io(_) => ErrorCategory::Network,
            Self::Config(_) => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Check if this error can be retried
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Retry hint carried by the error, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Llm(e) => e.retry_after,
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
