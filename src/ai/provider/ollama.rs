//! Ollama Local LLM Provider
//!
//! Client for the `/api/generate` endpoint of a locally-running Ollama.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    CompletionOptions, ErrorCategory, LlmError, LlmProvider, LlmResponse, TokenUsage, status_error,
    transport_error,
};
use crate::config::LlmConfig;
use crate::constants::llm::SYSTEM_PROMPT;
use crate::types::{DocError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:11434";
const PROVIDER: &str = "ollama";

/// Ollama Local LLM Provider
pub struct OllamaProvider {
    api_base: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_base = config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);

        // Validate endpoint URL for security (SSRF prevention)
        let api_base = Self::validate_endpoint(api_base)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { api_base, client })
    }

    /// Only allows http/https schemes and warns for non-localhost endpoints.
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            DocError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(DocError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
        {
            warn!(
                "Ollama endpoint is not localhost: {}. Ensure this is intentional.",
                host
            );
        }

        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }

    fn build_request(&self, prompt: &str, options: &CompletionOptions) -> OllamaRequest {
        OllamaRequest {
            model: options.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<LlmResponse> {
        info!(
            "Generating with Ollama (model: {}, temperature: {})",
            options.model, options.temperature
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, options);
        let url = format!("{}/api/generate", self.api_base);

        debug!("Sending request to Ollama API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::with_provider(
                        ErrorCategory::Network,
                        format!(
                            "Failed to connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                            self.api_base
                        ),
                        PROVIDER,
                    )
                    .into()
                } else {
                    transport_error(&e, PROVIDER)
                }
            })?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            return Err(status_error(response, PROVIDER).await);
        }

        let response_body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| transport_error(&e, PROVIDER))?;

        let usage = TokenUsage::from_ollama(
            response_body.prompt_eval_count.unwrap_or(0),
            response_body.eval_count.unwrap_or(0),
        );

        debug!(
            "{} responded in {}ms ({} input, {} output tokens)",
            PROVIDER,
            elapsed.as_millis(),
            usage.input_tokens,
            usage.output_tokens
        );

        Ok(LlmResponse {
            content: response_body.response,
            usage,
        })
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.api_base);

        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(tags) = resp.json::<OllamaTagsResponse>().await {
                    info!("Ollama is available with {} models", tags.models.len());
                } else {
                    info!("Ollama is available");
                }
                Ok(true)
            }
            Ok(resp) => {
                warn!("Ollama API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama not available: {}. Start with: ollama serve", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    system: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OllamaModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };
        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(matches!(
            OllamaProvider::validate_endpoint("file:///etc/passwd"),
            Err(DocError::Config(_))
        ));
        assert!(OllamaProvider::validate_endpoint("not a url").is_err());
    }

    #[test]
    fn test_request_carries_options() {
        let provider = OllamaProvider::new(&LlmConfig::default()).unwrap();
        let options = CompletionOptions {
            model: "llama3".to_string(),
            temperature: 0.3,
            max_tokens: 128,
        };
        let json = serde_json::to_value(provider.build_request("p", &options)).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 128);
    }
}
