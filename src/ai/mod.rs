//! AI Integration Layer
//!
//! Everything between an analyzed unit and the model service: prompt
//! construction under a token budget, the provider boundary, attempt
//! timeouts, response validation and run metrics.

pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod tokenizer;
pub mod validation;

pub use metrics::{MetricsCollector, MetricsSummary, SharedMetrics, create_shared_metrics};
pub use prompt::{ContextKind, Prompt, PromptBuilder, PromptSections};
pub use provider::{
    CompletionOptions, ErrorCategory, ErrorClassifier, LlmError, LlmProvider, LlmResponse,
    OllamaProvider, OpenAiProvider, SharedProvider, TokenUsage, create_provider,
};
pub use timeout::with_timeout;
pub use tokenizer::{TokenCounter, TokenEstimator};
pub use validation::{Rejection, ResponseValidator};
