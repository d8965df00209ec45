//! docloom - LLM-Driven Source Documentation Generator
//!
//! Normalizes Python, Rust, TypeScript/JavaScript and Go sources into a
//! common unit model, builds budgeted prompts per unit, drives an
//! unreliable completion service with bounded retries, and scores the
//! resulting documentation.
//!
//! ## Pipeline
//!
//! ```text
//! FileScanner -> CodeAnalyzer -> PromptBuilder -> GenerationEngine -> FragmentStore
//!                                                                  \-> Evaluator
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use docloom::{ConfigLoader, ProjectOrchestrator, create_provider};
//!
//! let config = ConfigLoader::load()?;
//! let provider = create_provider(&config.llm)?;
//! let orchestrator = ProjectOrchestrator::new(config, provider)?;
//! let run = orchestrator.generate_project(Path::new("src")).await?;
//! println!("{}", run);
//! ```
//!
//! ## Modules
//!
//! - [`analyzer`]: tree-sitter language adapters and the whole-file signal pass
//! - [`ai`]: completion services, prompt construction, response validation
//! - [`generation`]: retry state machine, request limiting, fragment store
//! - [`orchestrator`]: project-wide runs with partial-failure reporting
//! - [`evaluation`]: four-axis documentation scoring
//! - [`config`]: figment-based configuration

pub mod ai;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod constants;
pub mod evaluation;
pub mod generation;
pub mod orchestrator;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::{
    DocError, DocStyle, ErrorCategory, Result, SourceFile, SourceUnit, UnitId, UnitKind,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use analyzer::{
    CodeAnalyzer,
    parser::{Language, LanguageAdapter},
    scanner::FileScanner,
};

pub use ai::{
    LlmProvider, MetricsCollector, Prompt, PromptBuilder, ResponseValidator, SharedMetrics,
    SharedProvider, create_provider,
};

pub use generation::{
    CancellationSignal, DocumentationFragment, FailureKind, FailureReport, FragmentStore,
    GenerationEngine, GenerationFailure, RetryPolicy,
};

pub use orchestrator::{ProjectOrchestrator, ProjectRun, RunSummary};

pub use evaluation::{EvaluationReport, EvaluationScore, Evaluator};
