//! LLM Provider Abstraction
//!
//! Defines the LlmProvider trait: prompt text plus options in, completion
//! text or a classified error out. The generation engine is the only caller
//! and owns retries; providers make exactly one request per call.

mod ollama;
mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::types::{DocError, Result};

// =============================================================================
// Request Options & Response
// =============================================================================

/// Per-request knobs passed through to the model service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    /// Maximum output length in tokens
    pub max_tokens: usize,
}

impl CompletionOptions {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Completion text with the usage the service reported
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: TokenUsage,
}

/// Token usage reported by the service; zero when the service omits it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Create from OpenAI-style usage response
    pub fn from_openai(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
        }
    }

    /// Create from Ollama-style usage response
    pub fn from_ollama(prompt_eval_count: u32, eval_count: u32) -> Self {
        Self {
            input_tokens: prompt_eval_count,
            output_tokens: eval_count,
        }
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// Shared LLM provider type for concurrent access across requests
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one prompt and return the raw completion.
    ///
    /// Errors carry an [`ErrorCategory`] the caller uses to decide whether
    /// to retry.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        _ => Err(DocError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            config.provider
        ))),
    }
}

// =============================================================================
// Shared HTTP Helpers
// =============================================================================

/// Classify a transport-level failure from reqwest
pub(crate) fn transport_error(err: &reqwest::Error, provider: &str) -> DocError {
    let category = if err.is_timeout() {
        ErrorCategory::Timeout
    } else if err.is_connect() {
        ErrorCategory::Network
    } else if err.is_decode() || err.is_body() {
        ErrorCategory::MalformedResponse
    } else {
        return ErrorClassifier::classify(&err.to_string(), provider).into();
    };
    LlmError::with_provider(category, err.to_string(), provider).into()
}

/// Classify a non-success status, honoring a `Retry-After` header in seconds
pub(crate) async fn status_error(response: reqwest::Response, provider: &str) -> DocError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    let mut err = ErrorClassifier::classify_http_status(
        status.as_u16(),
        &format!("{} API error ({}): {}", provider, status, body),
        provider,
    );
    if let Some(delay) = retry_after {
        err = err.retry_after(delay);
    }
    err.into()
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider for exercising the generation engine offline

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub type Reply = std::result::Result<String, ErrorCategory>;
    type Responder = Box<dyn Fn(&str) -> Reply + Send + Sync>;

    /// Replays queued replies, then falls back to a responder
    pub struct ScriptedProvider {
        queue: Mutex<VecDeque<Reply>>,
        responder: Responder,
        delay: Option<Duration>,
        usage: TokenUsage,
        calls: AtomicU32,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<Reply>) -> Self {
            Self::with_responder(replies, |_| Err(ErrorCategory::Transient))
        }

        pub fn always(reply: Reply) -> Self {
            Self::with_responder(Vec::new(), move |_| reply.clone())
        }

        pub fn with_responder(
            replies: Vec<Reply>,
            responder: impl Fn(&str) -> Reply + Send + Sync + 'static,
        ) -> Self {
            Self {
                queue: Mutex::new(replies.into()),
                responder: Box::new(responder),
                delay: None,
                usage: TokenUsage::default(),
                calls: AtomicU32::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Usage reported with every successful reply
        pub fn with_usage(mut self, input_tokens: u32, output_tokens: u32) -> Self {
            self.usage = TokenUsage {
                input_tokens,
                output_tokens,
            };
            self
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let queued = self.queue.lock().unwrap().pop_front();
            let reply = queued.unwrap_or_else(|| (self.responder)(prompt));
            match reply {
                Ok(text) => Ok(LlmResponse {
                    content: text,
                    usage: self.usage,
                }),
                Err(category) => Err(LlmError::with_provider(category, "scripted failure", "scripted").into()),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(matches!(create_provider(&config), Err(DocError::Config(_))));
    }

    #[test]
    fn test_options_from_config() {
        let config = LlmConfig::default();
        let options = CompletionOptions::from_config(&config);
        assert_eq!(options.model, config.model);
        assert_eq!(options.max_tokens, config.max_tokens);
    }

    #[tokio::test]
    async fn test_scripted_queue_then_responder() {
        let provider = ScriptedProvider::with_responder(
            vec![Err(ErrorCategory::RateLimit)],
            |prompt| Ok(format!("echo {}", prompt.len())),
        );
        let options = CompletionOptions::from_config(&LlmConfig::default());

        let first = provider.complete("abc", &options).await.unwrap_err();
        assert_eq!(first.category(), ErrorCategory::RateLimit);
        let second = provider.complete("abc", &options).await.unwrap();
        assert_eq!(second.content, "echo 3");
        assert_eq!(provider.calls(), 2);
        assert_eq!(provider.prompts(), vec!["abc", "abc"]);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage::from_openai(120, 40);
        total += TokenUsage::from_ollama(30, 10);
        assert_eq!(total, TokenUsage::from_openai(150, 50));
    }
}
