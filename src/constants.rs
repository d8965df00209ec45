//! Global Constants
//!
//! Centralized defaults for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Model service defaults
pub mod llm {
    /// Default model identifier
    pub const DEFAULT_MODEL: &str = "gpt-4";

    /// Default sampling temperature (low for factual documentation)
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;

    /// Default maximum output tokens
    pub const DEFAULT_MAX_TOKENS: usize = 4096;

    /// System message sent alongside every prompt
    pub const SYSTEM_PROMPT: &str = "You are an assistant specialized in generating high-quality technical documentation for source code.";
}

/// Prompt construction constants
pub mod prompt {
    /// Tokens held back from the model window for the completion itself
    pub const RESPONSE_RESERVE_TOKENS: usize = 1000;

    /// Default context budget in tokens
    pub const DEFAULT_CONTEXT_BUDGET: usize = super::llm::DEFAULT_MAX_TOKENS - RESPONSE_RESERVE_TOKENS;

    /// Smallest budget accepted by configuration validation
    pub const MIN_CONTEXT_BUDGET: usize = 64;

    /// Maximum sibling signatures offered as context
    pub const MAX_SIBLINGS: usize = 12;
}

/// Retry state machine constants
pub mod retry {
    /// Default maximum attempts per request (first try included)
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (milliseconds)
    pub const MAX_DELAY_MS: u64 = 30_000;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Concurrency constants
pub mod concurrency {
    /// Maximum generation requests in flight
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

    /// Files analyzed concurrently
    pub const DEFAULT_FILE_CONCURRENCY: usize = 4;
}

/// File analysis constants
pub mod analysis {
    /// Maximum file size to analyze (1MB)
    pub const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Directories never walked
    pub const DEFAULT_SKIP_DIRS: &[&str] = &[
        ".git",
        "node_modules",
        "venv",
        ".venv",
        "__pycache__",
        "dist",
        "build",
        "target",
    ];
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Default per-attempt timeout (seconds)
    pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 120;
}
