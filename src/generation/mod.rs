//! Generation Engine
//!
//! Turns one [`Prompt`] into an accepted [`DocumentationFragment`] or a
//! [`GenerationFailure`]. Each request runs its own [`RequestMachine`];
//! the engine supplies the I/O around it:
//!
//! 1. Wait for a limiter permit (abandoned on cancellation)
//! 2. Call the provider under the attempt timeout
//! 3. Validate the completion; a rejection counts as a transient failure
//! 4. Feed the outcome to the machine and follow its next state

pub mod cancel;
pub mod limiter;
pub mod state;
pub mod store;

pub use cancel::CancellationSignal;
pub use limiter::RequestLimiter;
pub use state::{AttemptOutcome, RequestMachine, RequestState, RetryPolicy};
pub use store::{
    AttemptRecord, DocumentationFragment, FailureKind, FailureReport, FragmentStore,
    GenerationFailure, GenerationMetadata,
};

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::ai::{
    CompletionOptions, Prompt, ResponseValidator, SharedMetrics, SharedProvider, TokenUsage,
    with_timeout,
};
use crate::config::{GenerationConfig, LlmConfig};
use crate::types::{DocError, ErrorCategory};

pub struct GenerationEngine {
    provider: SharedProvider,
    options: CompletionOptions,
    policy: RetryPolicy,
    validator: ResponseValidator,
    limiter: RequestLimiter,
    attempt_timeout: Duration,
    metrics: SharedMetrics,
}

impl GenerationEngine {
    pub fn new(
        provider: SharedProvider,
        llm: &LlmConfig,
        config: &GenerationConfig,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            provider,
            options: CompletionOptions::from_config(llm),
            policy: RetryPolicy::from_config(config),
            validator: ResponseValidator::new(config.length),
            limiter: RequestLimiter::new(
                config.max_in_flight,
                Duration::from_millis(config.min_interval_ms),
            ),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            metrics,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Drive one request to a terminal state.
    ///
    /// Over-budget prompts are still sent; the builder has already flagged
    /// them.
    #[instrument(skip(self, prompt, cancel), fields(unit = %prompt.unit_id, template = prompt.template_id))]
    pub async fn generate(
        &self,
        prompt: &Prompt,
        cancel: &CancellationSignal,
    ) -> Result<DocumentationFragment, GenerationFailure> {
        if prompt.truncated {
            self.metrics.record_truncation();
        }

        let mut machine = RequestMachine::new(self.policy.clone());
        let mut attempt_log = Vec::new();
        let mut total_latency_ms = 0u64;
        let mut usage = TokenUsage::default();

        loop {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.cancelled(prompt, machine.attempts()));
                }
                permit = self.limiter.acquire() => permit,
            };
            let permit = match permit {
                Ok(permit) => permit,
                Err(err) => {
                    self.metrics.record_failure();
                    return Err(GenerationFailure::new(
                        prompt.unit_id.clone(),
                        FailureKind::Fatal,
                        machine.attempts(),
                        err.to_string(),
                    ));
                }
            };

            let Some(attempt) = machine.start() else {
                self.metrics.record_failure();
                return Err(GenerationFailure::new(
                    prompt.unit_id.clone(),
                    FailureKind::Fatal,
                    machine.attempts(),
                    "request already finished",
                ));
            };

            let started = Instant::now();
            let result = with_timeout(
                self.attempt_timeout,
                self.provider.complete(&prompt.text, &self.options),
                "completion",
            )
            .await;
            drop(permit);

            let latency_ms = started.elapsed().as_millis() as u64;
            total_latency_ms += latency_ms;
            self.metrics.record_attempt(latency_ms);
            if let Ok(response) = &result {
                usage += response.usage;
                self.metrics
                    .record_usage(response.usage, prompt.estimated_tokens);
            }

            let mut accepted = None;
            let outcome = match result {
                Ok(response) => match self.validator.validate(&response.content, prompt) {
                    Ok(text) => {
                        accepted = Some(text);
                        AttemptOutcome::Accepted
                    }
                    Err(rejection) => AttemptOutcome::Transient {
                        category: ErrorCategory::MalformedResponse,
                        detail: rejection.to_string(),
                        retry_after: None,
                    },
                },
                Err(err) => classify(&err),
            };

            attempt_log.push(AttemptRecord {
                attempt,
                outcome: outcome.label().to_string(),
                latency_ms,
                detail: outcome.detail().map(str::to_string),
            });

            match machine.record(&outcome).clone() {
                RequestState::Succeeded { attempts } => {
                    self.metrics.record_success();
                    info!(attempts, latency_ms = total_latency_ms, "Fragment accepted");
                    return Ok(DocumentationFragment {
                        unit_id: prompt.unit_id.clone(),
                        text: accepted.unwrap_or_default(),
                        style: prompt.style,
                        metadata: GenerationMetadata {
                            model: self.options.model.clone(),
                            template_id: prompt.template_id.to_string(),
                            attempts,
                            retries: attempts.saturating_sub(1),
                            latency_ms: total_latency_ms,
                            usage,
                            attempt_log,
                            truncated: prompt.truncated,
                            generated_at: Utc::now(),
                        },
                    });
                }
                RequestState::Failed {
                    attempts,
                    exhausted,
                } => {
                    self.metrics.record_failure();
                    let kind = if exhausted {
                        FailureKind::RetriesExhausted
                    } else {
                        FailureKind::Fatal
                    };
                    let detail = outcome.detail().unwrap_or("unknown failure").to_string();
                    warn!(attempts, kind = %kind, error = %detail, "Request failed");
                    return Err(GenerationFailure::new(
                        prompt.unit_id.clone(),
                        kind,
                        attempts,
                        detail,
                    ));
                }
                RequestState::Retrying { attempt, delay } => {
                    self.metrics.record_retry();
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = outcome.detail().unwrap_or_default(),
                        "Retrying after backoff"
                    );
                    if !cancel.sleep(delay).await {
                        return Err(self.cancelled(prompt, machine.attempts()));
                    }
                }
                RequestState::Pending | RequestState::InFlight { .. } => {}
            }
        }
    }

    fn cancelled(&self, prompt: &Prompt, attempts: u32) -> GenerationFailure {
        self.metrics.record_failure();
        debug!(attempts, "Request cancelled");
        GenerationFailure::new(
            prompt.unit_id.clone(),
            FailureKind::Cancelled,
            attempts,
            "run cancelled",
        )
    }
}

/// Map a provider error onto the machine's outcome
fn classify(err: &DocError) -> AttemptOutcome {
    let category = err.category();
    if category.is_retryable() {
        AttemptOutcome::Transient {
            category,
            detail: err.to_string(),
            retry_after: err.retry_after(),
        }
    } else {
        AttemptOutcome::Fatal {
            category,
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::ai::create_shared_metrics;
    use crate::ai::provider::testing::ScriptedProvider;
    use crate::types::{DocStyle, UnitId};

    const GOOD: &str =
        "Adds two numbers and returns their sum. Both arguments must support addition.";

    fn prompt() -> Prompt {
        Prompt {
            unit_id: UnitId::new("math.py", "add"),
            template_id: "callable-api-doc",
            text: "Document this function.\n```python\ndef add(a, b):\n    return a + b\n```"
                .to_string(),
            signature: "def add(a, b):".to_string(),
            estimated_tokens: 24,
            style: DocStyle::ApiDoc,
            truncated: false,
            dropped: Vec::new(),
            over_budget: false,
        }
    }

    fn config(max_attempts: u32) -> GenerationConfig {
        GenerationConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..GenerationConfig::default()
        }
    }

    fn engine(provider: Arc<ScriptedProvider>, max_attempts: u32) -> GenerationEngine {
        GenerationEngine::new(
            provider,
            &LlmConfig::default(),
            &config(max_attempts),
            create_shared_metrics("test"),
        )
    }

    #[tokio::test]
    async fn test_transient_errors_use_exactly_max_attempts() {
        let provider = Arc::new(ScriptedProvider::always(Err(ErrorCategory::Transient)));
        let engine = engine(Arc::clone(&provider), 3);

        let failure = engine
            .generate(&prompt(), &CancellationSignal::new())
            .await
            .unwrap_err();
        assert_eq!(provider.calls(), 3);
        assert_eq!(failure.kind, FailureKind::RetriesExhausted);
        assert_eq!(failure.attempts, 3);

        let metrics = engine.metrics().snapshot();
        assert_eq!(metrics.attempts, 3);
        assert_eq!(metrics.retries, 2);
        assert_eq!(metrics.failed, 1);
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::always(Err(ErrorCategory::Auth)));
        let engine = engine(Arc::clone(&provider), 5);

        let failure = engine
            .generate(&prompt(), &CancellationSignal::new())
            .await
            .unwrap_err();
        assert_eq!(provider.calls(), 1);
        assert_eq!(failure.kind, FailureKind::Fatal);
    }

    #[tokio::test]
    async fn test_rejected_response_is_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("   ".to_string()),
            Ok("def add(a, b):".to_string()),
            Ok(GOOD.to_string()),
        ]));
        let engine = engine(Arc::clone(&provider), 3);

        let fragment = engine
            .generate(&prompt(), &CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(provider.calls(), 3);
        assert_eq!(fragment.text, GOOD);
        assert_eq!(fragment.style, DocStyle::ApiDoc);
        assert_eq!(fragment.metadata.attempts, 3);
        assert_eq!(fragment.metadata.retries, 2);
    }

    #[tokio::test]
    async fn test_metadata_records_each_attempt() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Err(ErrorCategory::RateLimit), Ok(GOOD.to_string())])
                .with_delay(Duration::from_millis(5)),
        );
        let engine = engine(Arc::clone(&provider), 3);

        let fragment = engine
            .generate(&prompt(), &CancellationSignal::new())
            .await
            .unwrap();
        let log = &fragment.metadata.attempt_log;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].outcome, "transient");
        assert!(log[0].detail.as_deref().unwrap().contains("scripted failure"));
        assert_eq!(log[1].outcome, "accepted");
        assert!(log[1].detail.is_none());
        assert!(fragment.metadata.latency_ms >= 10);
        assert_eq!(fragment.metadata.template_id, "callable-api-doc");
        assert_eq!(fragment.metadata.model, LlmConfig::default().model);
    }

    #[tokio::test]
    async fn test_reported_usage_reaches_metadata_and_metrics() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Ok("   ".to_string()), Ok(GOOD.to_string())])
                .with_usage(90, 30),
        );
        let engine = engine(Arc::clone(&provider), 3);

        let fragment = engine
            .generate(&prompt(), &CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(fragment.metadata.usage, TokenUsage::from_openai(180, 60));

        let metrics = engine.metrics().snapshot();
        assert_eq!(metrics.prompt_tokens, 180);
        assert_eq!(metrics.completion_tokens, 60);
    }

    #[tokio::test]
    async fn test_missing_usage_falls_back_to_prompt_estimate() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let engine = engine(Arc::clone(&provider), 1);

        let fragment = engine
            .generate(&prompt(), &CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(fragment.metadata.usage, TokenUsage::default());
        assert_eq!(engine.metrics().snapshot().prompt_tokens, 24);
        assert_eq!(engine.metrics().snapshot().completion_tokens, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_call() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let engine = engine(Arc::clone(&provider), 3);
        let cancel = CancellationSignal::new();
        cancel.cancel();

        let failure = engine.generate(&prompt(), &cancel).await.unwrap_err();
        assert_eq!(provider.calls(), 0);
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(failure.attempts, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retries() {
        let provider = Arc::new(ScriptedProvider::always(Err(ErrorCategory::Network)));
        let engine = GenerationEngine::new(
            Arc::clone(&provider) as SharedProvider,
            &LlmConfig::default(),
            &GenerationConfig {
                max_attempts: 5,
                base_delay_ms: 10_000,
                max_delay_ms: 10_000,
                ..GenerationConfig::default()
            },
            create_shared_metrics("test"),
        );
        let cancel = CancellationSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let failure = engine.generate(&prompt(), &cancel).await.unwrap_err();
        assert_eq!(provider.calls(), 1);
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Ok(GOOD.to_string()), Ok(GOOD.to_string())])
                .with_delay(Duration::from_millis(200)),
        );
        let engine = engine(Arc::clone(&provider), 2).with_attempt_timeout(Duration::from_millis(20));

        let failure = engine
            .generate(&prompt(), &CancellationSignal::new())
            .await
            .unwrap_err();
        assert_eq!(provider.calls(), 2);
        assert_eq!(failure.kind, FailureKind::RetriesExhausted);
        assert!(failure.detail.contains("Timeout"));
    }

    #[tokio::test]
    async fn test_truncated_prompt_is_counted() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let engine = engine(Arc::clone(&provider), 1);
        let mut prompt = prompt();
        prompt.truncated = true;

        let fragment = engine.generate(&prompt, &CancellationSignal::new()).await.unwrap();
        assert!(fragment.metadata.truncated);
        assert_eq!(engine.metrics().snapshot().truncated_prompts, 1);
    }
}
