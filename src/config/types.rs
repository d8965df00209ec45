//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/docloom/) and project (.docloom/) level configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::analyzer::parser::Language;
use crate::constants::{analysis, concurrency, llm, network, prompt, retry};
use crate::types::{DocError, DocStyle, Result, UnitKind};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source discovery and language mapping
    pub analysis: AnalysisConfig,

    /// Prompt construction
    pub prompt: PromptConfig,

    /// Retry, pacing and validation of model requests
    pub generation: GenerationConfig,

    /// Model service settings
    pub llm: LlmConfig,

    /// Scoring settings
    pub evaluation: EvaluationConfig,
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `DocError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DocError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(DocError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(DocError::Config(
                "LLM max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.prompt.context_budget < prompt::MIN_CONTEXT_BUDGET {
            return Err(DocError::Config(format!(
                "Prompt context_budget must be at least {}, got {}",
                prompt::MIN_CONTEXT_BUDGET,
                self.prompt.context_budget
            )));
        }

        self.generation.validate()?;
        self.evaluation.weights.validate()?;
        self.analysis.extension_map()?;

        Ok(())
    }
}

// =============================================================================
// Analysis Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Glob patterns to include (empty = everything)
    pub include: Vec<String>,

    /// Glob patterns to exclude, relative to the project root
    pub exclude: Vec<String>,

    /// Maximum file size in bytes
    pub max_file_size: u64,

    /// File extension (without dot) to language name
    pub extensions: BTreeMap<String, String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let extensions = Language::all()
            .iter()
            .flat_map(|lang| {
                lang.default_extensions()
                    .iter()
                    .map(move |ext| (ext.to_string(), lang.highlight_str().to_string()))
            })
            .collect();

        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_size: analysis::MAX_FILE_SIZE,
            extensions,
        }
    }
}

impl AnalysisConfig {
    /// Resolve the extension table, rejecting unknown language names
    pub fn extension_map(&self) -> Result<HashMap<String, Language>> {
        self.extensions
            .iter()
            .map(|(ext, name)| {
                let language = name.parse::<Language>().map_err(|e| {
                    DocError::Config(format!("analysis.extensions.{}: {}", ext, e))
                })?;
                Ok((ext.trim_start_matches('.').to_lowercase(), language))
            })
            .collect()
    }
}

// =============================================================================
// Prompt Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Maximum prompt size in estimated tokens
    pub context_budget: usize,

    /// Output style per unit kind
    pub styles: StyleByKind,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            context_budget: prompt::DEFAULT_CONTEXT_BUDGET,
            styles: StyleByKind::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleByKind {
    pub module: DocStyle,
    pub class: DocStyle,
    pub function: DocStyle,
    pub method: DocStyle,
}

impl Default for StyleByKind {
    fn default() -> Self {
        Self {
            module: DocStyle::Guide,
            class: DocStyle::ApiDoc,
            function: DocStyle::ApiDoc,
            method: DocStyle::ApiDoc,
        }
    }
}

impl StyleByKind {
    pub fn for_kind(&self, kind: UnitKind) -> DocStyle {
        match kind {
            UnitKind::Module => self.module,
            UnitKind::Class => self.class,
            UnitKind::Function => self.function,
            UnitKind::Method => self.method,
        }
    }
}

// =============================================================================
// Generation Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per request, first try included
    pub max_attempts: u32,

    /// Initial backoff delay (milliseconds)
    pub base_delay_ms: u64,

    /// Backoff ceiling (milliseconds)
    pub max_delay_ms: u64,

    /// Backoff multiplier per retry
    pub backoff_factor: f32,

    /// Wall-clock bound for one attempt (seconds)
    pub attempt_timeout_secs: u64,

    /// Model requests in flight at once
    pub max_in_flight: usize,

    /// Files processed concurrently
    pub file_concurrency: usize,

    /// Minimum spacing between request starts (milliseconds, 0 = unpaced)
    pub min_interval_ms: u64,

    /// Accepted response length per style (characters)
    pub length: LengthBounds,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: retry::BASE_DELAY_MS,
            max_delay_ms: retry::MAX_DELAY_MS,
            backoff_factor: retry::BACKOFF_FACTOR,
            attempt_timeout_secs: network::DEFAULT_ATTEMPT_TIMEOUT_SECS,
            max_in_flight: concurrency::DEFAULT_MAX_IN_FLIGHT,
            file_concurrency: concurrency::DEFAULT_FILE_CONCURRENCY,
            min_interval_ms: 0,
            length: LengthBounds::default(),
        }
    }
}

impl GenerationConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DocError::Config(
                "generation.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_factor < 1.0 {
            return Err(DocError::Config(format!(
                "generation.backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(DocError::Config(format!(
                "generation.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        if self.attempt_timeout_secs == 0 {
            return Err(DocError::Config(
                "generation.attempt_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_in_flight == 0 || self.file_concurrency == 0 {
            return Err(DocError::Config(
                "generation.max_in_flight and file_concurrency must be greater than 0".to_string(),
            ));
        }
        for style in [DocStyle::InlineComment, DocStyle::ApiDoc, DocStyle::Guide] {
            let bounds = self.length.for_style(style);
            if bounds.min > bounds.max {
                return Err(DocError::Config(format!(
                    "generation.length.{}: min {} exceeds max {}",
                    style, bounds.min, bounds.max
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: usize,
    pub max: usize,
}

impl Bounds {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthBounds {
    pub inline_comment: Bounds,
    pub api_doc: Bounds,
    pub guide: Bounds,
}

impl Default for LengthBounds {
    fn default() -> Self {
        Self {
            inline_comment: Bounds::new(20, 1_500),
            api_doc: Bounds::new(60, 8_000),
            guide: Bounds::new(150, 16_000),
        }
    }
}

impl LengthBounds {
    pub fn for_style(&self, style: DocStyle) -> Bounds {
        match style {
            DocStyle::InlineComment => self.inline_comment,
            DocStyle::ApiDoc => self.api_doc,
            DocStyle::Guide => self.guide,
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (`openai` or `ollama`)
    pub provider: String,

    /// Model name
    pub model: String,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum output tokens per completion
    pub max_tokens: usize,

    /// Custom endpoint (OpenAI-compatible base URL or Ollama host)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// HTTP client timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: llm::DEFAULT_MODEL.to_string(),
            temperature: llm::DEFAULT_TEMPERATURE,
            max_tokens: llm::DEFAULT_MAX_TOKENS,
            api_base: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Evaluation Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub weights: ScoreWeights,
}

/// Relative weight of each sub-score in the aggregate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub completeness: f64,
    pub precision: f64,
    pub clarity: f64,
    pub utility: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            completeness: 1.0,
            precision: 1.0,
            clarity: 1.0,
            utility: 1.0,
        }
    }
}

impl ScoreWeights {
    fn as_array(&self) -> [f64; 4] {
        [self.completeness, self.precision, self.clarity, self.utility]
    }

    pub fn validate(&self) -> Result<()> {
        let weights = self.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(DocError::Config(
                "evaluation.weights must be finite and non-negative".to_string(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(DocError::Config(
                "evaluation.weights must have a positive sum".to_string(),
            ));
        }
        Ok(())
    }

    /// Weights scaled to sum to 1; invalid weights fall back to equal shares
    pub fn normalized(&self) -> Self {
        if self.validate().is_err() {
            return Self {
                completeness: 0.25,
                precision: 0.25,
                clarity: 0.25,
                utility: 0.25,
            };
        }
        let total: f64 = self.as_array().iter().sum();
        Self {
            completeness: self.completeness / total,
            precision: self.precision / total,
            clarity: self.clarity / total,
            utility: self.utility / total,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
