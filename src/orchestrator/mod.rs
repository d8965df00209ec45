//! Project Orchestrator
//!
//! Runs the pipeline over a project root or a single file:
//!
//! ```text
//! FileScanner -> CodeAnalyzer -> PromptBuilder -> GenerationEngine
//!                 (per file)       (per unit)       (per unit)
//! ```
//!
//! Files and units are independent. Each worker returns its results and
//! this module is the only place they are merged into the fragment store
//! and failure report. A failing file or unit never aborts the run; only a
//! missing root or an analyzer without adapters does.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::ai::{MetricsSummary, PromptBuilder, SharedMetrics, SharedProvider, create_shared_metrics};
use crate::analyzer::CodeAnalyzer;
use crate::analyzer::scanner::FileScanner;
use crate::analyzer::scanner::file_scanner::relative_path;
use crate::config::{Config, StyleByKind};
use crate::generation::{
    CancellationSignal, DocumentationFragment, FailureKind, FailureReport, FragmentStore,
    GenerationEngine, GenerationFailure,
};
use crate::types::{DocError, Result, SourceFile, SourceUnit, UnitId};

// =============================================================================
// Run Context
// =============================================================================

/// Everything a worker needs for one run, passed explicitly
struct RunContext {
    analyzer: Arc<CodeAnalyzer>,
    builder: PromptBuilder,
    engine: GenerationEngine,
    cancel: CancellationSignal,
    styles: StyleByKind,
    budget: usize,
    metrics: SharedMetrics,
    max_in_flight: usize,
}

/// What one file worker produced
#[derive(Debug, Default)]
struct FileOutcome {
    analyzed: bool,
    units: usize,
    fragments: Vec<DocumentationFragment>,
    failures: Vec<GenerationFailure>,
}

impl FileOutcome {
    fn failed(label: &str, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            failures: vec![GenerationFailure::new(UnitId::for_file(label), kind, 0, detail)],
            ..Self::default()
        }
    }
}

// =============================================================================
// Run Output
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub root: String,
    pub files_seen: usize,
    pub files_analyzed: usize,
    pub units_total: usize,
    pub units_succeeded: usize,
    pub units_failed: BTreeMap<FailureKind, usize>,
    pub cancelled: bool,
    pub metrics: MetricsSummary,
}

impl RunSummary {
    pub fn failed_total(&self) -> usize {
        self.units_failed.values().sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Run {} on {}{}",
            self.run_id,
            self.root,
            if self.cancelled { " (cancelled)" } else { "" }
        )?;
        writeln!(
            f,
            "Files: {} seen, {} analyzed",
            self.files_seen, self.files_analyzed
        )?;
        write!(
            f,
            "Units: {} total, {} succeeded, {} failed",
            self.units_total,
            self.units_succeeded,
            self.failed_total()
        )?;
        if !self.units_failed.is_empty() {
            let kinds: Vec<String> = self
                .units_failed
                .iter()
                .map(|(kind, count)| format!("{}: {}", kind, count))
                .collect();
            write!(f, " ({})", kinds.join(", "))?;
        }
        Ok(())
    }
}

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct ProjectRun {
    pub fragments: FragmentStore,
    pub failures: FailureReport,
    pub summary: RunSummary,
}

impl fmt::Display for ProjectRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        if self.failures.is_empty() {
            return Ok(());
        }
        write!(f, "\nFailures:")?;
        for failure in self.failures.iter() {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct ProjectOrchestrator {
    config: Config,
    analyzer: Arc<CodeAnalyzer>,
    provider: SharedProvider,
    cancel: CancellationSignal,
}

impl ProjectOrchestrator {
    pub fn new(config: Config, provider: SharedProvider) -> Result<Self> {
        config.validate()?;
        let analyzer = CodeAnalyzer::new(&config.analysis)?;
        Ok(Self {
            config,
            analyzer: Arc::new(analyzer),
            provider,
            cancel: CancellationSignal::new(),
        })
    }

    pub fn with_analyzer(mut self, analyzer: CodeAnalyzer) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    /// Handle that stops the run when fired
    pub fn cancellation(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    fn context(&self, run_id: Uuid) -> RunContext {
        let metrics = create_shared_metrics(run_id.to_string());
        let generation = &self.config.generation;
        RunContext {
            analyzer: Arc::clone(&self.analyzer),
            builder: PromptBuilder::default(),
            engine: GenerationEngine::new(
                Arc::clone(&self.provider),
                &self.config.llm,
                generation,
                Arc::clone(&metrics),
            ),
            cancel: self.cancel.clone(),
            styles: self.config.prompt.styles,
            budget: self.config.prompt.context_budget,
            metrics,
            max_in_flight: generation.max_in_flight.max(1),
        }
    }

    fn ensure_runnable(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(DocError::Config(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }
        if !self.analyzer.has_adapters() {
            return Err(DocError::Config("No language adapters registered".to_string()));
        }
        Ok(())
    }

    /// Document every supported file under `root`.
    ///
    /// A file path is handled as a single-file run.
    #[instrument(skip(self, root), fields(root = %root.display()))]
    pub async fn generate_project(&self, root: &Path) -> Result<ProjectRun> {
        self.ensure_runnable(root)?;
        if root.is_file() {
            return self.generate_file(root).await;
        }

        let analysis = &self.config.analysis;
        let scanned = FileScanner::new(root)
            .with_include(&analysis.include)
            .with_exclude(&analysis.exclude)
            .with_max_file_size(analysis.max_file_size)
            .scan()?;
        let files_seen = scanned.len();

        let candidates: Vec<(PathBuf, String)> = scanned
            .into_iter()
            .filter(|file| {
                let accepted = self.analyzer.accepts(&file.path);
                if !accepted {
                    debug!("Skipping {} (no adapter)", file.relative);
                }
                accepted
            })
            .map(|file| (file.path, file.relative))
            .collect();

        info!(
            "Documenting {} of {} files (file concurrency={})",
            candidates.len(),
            files_seen,
            self.config.generation.file_concurrency
        );

        self.run(root, files_seen, candidates).await
    }

    /// Document a single file; its label is the file name.
    pub async fn generate_file(&self, path: &Path) -> Result<ProjectRun> {
        self.ensure_runnable(path)?;
        let label = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => relative_path(parent, path),
            _ => path.to_string_lossy().to_string(),
        };
        self.run(path, 1, vec![(path.to_path_buf(), label)]).await
    }

    async fn run(
        &self,
        root: &Path,
        files_seen: usize,
        files: Vec<(PathBuf, String)>,
    ) -> Result<ProjectRun> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let ctx = self.context(run_id);

        let mut fragments = FragmentStore::new();
        let mut failures = FailureReport::new();
        let mut files_analyzed = 0;
        let mut units_total = 0;

        let ctx_ref = &ctx;
        let mut stream = futures::stream::iter(files)
            .map(|(path, label)| process_file(ctx_ref, path, label))
            .buffer_unordered(self.config.generation.file_concurrency.max(1));

        // Single aggregation point
        while let Some(outcome) = stream.next().await {
            if outcome.analyzed {
                files_analyzed += 1;
            }
            units_total += outcome.units;
            for fragment in outcome.fragments {
                fragments.insert(fragment);
            }
            for failure in outcome.failures {
                failures.record(failure);
            }
        }

        let summary = RunSummary {
            run_id,
            started_at,
            root: root.display().to_string(),
            files_seen,
            files_analyzed,
            units_total,
            units_succeeded: fragments.len(),
            units_failed: failures.by_kind(),
            cancelled: ctx.cancel.is_cancelled(),
            metrics: ctx.metrics.summary(),
        };

        info!(
            succeeded = summary.units_succeeded,
            failed = summary.failed_total(),
            cancelled = summary.cancelled,
            "Run complete"
        );

        Ok(ProjectRun {
            fragments,
            failures,
            summary,
        })
    }
}

// =============================================================================
// Workers
// =============================================================================

async fn process_file(ctx: &RunContext, path: PathBuf, label: String) -> FileOutcome {
    let analyzer = Arc::clone(&ctx.analyzer);
    let task_label = label.clone();
    let analyzed =
        tokio::task::spawn_blocking(move || analyzer.analyze_as(&path, &task_label)).await;

    let file = match analyzed {
        Ok(Ok(file)) => file,
        Ok(Err(err)) => {
            let kind = match err {
                DocError::UnsupportedLanguage { .. } => FailureKind::UnsupportedLanguage,
                _ => FailureKind::Analysis,
            };
            warn!("Failed to analyze {}: {}", label, err);
            return FileOutcome::failed(&label, kind, err.to_string());
        }
        Err(join_err) => {
            warn!("Analysis task for {} failed: {}", label, join_err);
            return FileOutcome::failed(&label, FailureKind::Analysis, join_err.to_string());
        }
    };

    if file.is_total_failure() {
        warn!("No units could be parsed in {}", label);
        return FileOutcome::failed(
            &label,
            FailureKind::Analysis,
            format!("no units could be parsed ({} diagnostics)", file.diagnostics.len()),
        );
    }

    let mut outcome = FileOutcome {
        analyzed: true,
        units: file.units.len(),
        ..FileOutcome::default()
    };

    let file = &file;
    let mut results = futures::stream::iter(file.units.iter())
        .map(|unit| async move { process_unit(ctx, file, unit).await })
        .buffer_unordered(ctx.max_in_flight);

    while let Some(result) = results.next().await {
        match result {
            Ok(fragment) => outcome.fragments.push(fragment),
            Err(failure) => outcome.failures.push(failure),
        }
    }

    outcome
}

async fn process_unit(
    ctx: &RunContext,
    file: &SourceFile,
    unit: &SourceUnit,
) -> std::result::Result<DocumentationFragment, GenerationFailure> {
    if unit.is_unparsed() {
        ctx.metrics.record_skipped();
        let line = unit.span.start_line;
        return Err(GenerationFailure::new(
            unit.id.clone(),
            FailureKind::Unparsed,
            0,
            format!("unit at line {} could not be parsed", line),
        ));
    }

    let style = ctx.styles.for_kind(unit.kind);
    let prompt = ctx.builder.build(file, unit, style, ctx.budget);
    ctx.engine.generate(&prompt, &ctx.cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::ScriptedProvider;
    use crate::types::ErrorCategory;
    use tempfile::TempDir;

    const GOOD: &str =
        "Performs one step of the workflow and returns once the step has fully completed.";

    const RUST_WITH_SYNTAX_ERROR: &str =
        "fn ok_one() {}\n\nfn broken() -> i32 { 1 + }\n\nfn ok_two() {}\n";

    fn config() -> Config {
        let mut config = Config::default();
        config.generation.base_delay_ms = 1;
        config.generation.max_delay_ms = 5;
        config
    }

    fn orchestrator(provider: Arc<ScriptedProvider>) -> ProjectOrchestrator {
        ProjectOrchestrator::new(config(), provider).unwrap()
    }

    fn write(dir: &TempDir, name: &str, content: &[u8]) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_syntax_error_fails_only_that_unit() {
        let dir = TempDir::new().unwrap();
        write(&dir, "lib.rs", RUST_WITH_SYNTAX_ERROR.as_bytes());
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));

        let run = orchestrator(Arc::clone(&provider))
            .generate_project(dir.path())
            .await
            .unwrap();

        assert_eq!(provider.calls(), 2);
        assert_eq!(run.fragments.len(), 2);
        assert!(run.fragments.contains(&UnitId::new("lib.rs", "ok_one")));
        assert!(run.fragments.contains(&UnitId::new("lib.rs", "ok_two")));

        assert_eq!(run.failures.len(), 1);
        let failure = run.failures.get(&UnitId::new("lib.rs", "broken")).unwrap();
        assert_eq!(failure.kind, FailureKind::Unparsed);
        assert_eq!(failure.attempts, 0);

        assert_eq!(run.summary.units_total, 3);
        assert_eq!(run.summary.units_succeeded, 2);
        assert_eq!(run.summary.units_failed[&FailureKind::Unparsed], 1);
        assert_eq!(run.summary.metrics.skipped, 1);
        assert!(run.to_string().contains("lib.rs::broken [unparsed]"));
    }

    #[tokio::test]
    async fn test_rerun_yields_identical_store() {
        let dir = TempDir::new().unwrap();
        write(&dir, "pkg/shapes.py", b"class Square:\n    def area(self):\n        return 4\n\ndef make():\n    return Square()\n");
        write(&dir, "main.go", b"package main\n\nfunc Run(n int) int {\n\treturn n\n}\n");
        let provider = Arc::new(ScriptedProvider::with_responder(Vec::new(), |prompt| {
            Ok(format!(
                "Documentation generated for a prompt of {} characters, covering behavior and inputs.",
                prompt.len()
            ))
        }));
        let orchestrator = orchestrator(provider);

        let first = orchestrator.generate_project(dir.path()).await.unwrap();
        let second = orchestrator.generate_project(dir.path()).await.unwrap();

        assert!(first.failures.is_empty(), "{}", first);
        assert_eq!(first.fragments.len(), 4);
        assert_eq!(first.fragments.fingerprint(), second.fragments.fingerprint());
        assert_ne!(first.summary.run_id, second.summary.run_id);

        let index = first.fragments.index();
        assert_eq!(index["pkg"]["pkg/shapes.py"].len(), 3);
        assert_eq!(index["."]["main.go"].len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_does_not_abort_run() {
        let dir = TempDir::new().unwrap();
        write(&dir, "good.py", b"def ok():\n    return 1\n");
        write(&dir, "bad.py", &[0xff, 0xfe, 0xfd, 0x00]);
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));

        let run = orchestrator(provider).generate_project(dir.path()).await.unwrap();

        assert_eq!(run.fragments.len(), 1);
        let failure = run.failures.get(&UnitId::for_file("bad.py")).unwrap();
        assert_eq!(failure.kind, FailureKind::Analysis);
        assert_eq!(run.summary.files_seen, 2);
        assert_eq!(run.summary.files_analyzed, 1);
    }

    #[tokio::test]
    async fn test_unsupported_files_are_filtered() {
        let dir = TempDir::new().unwrap();
        write(&dir, "notes.txt", b"not code");
        write(&dir, "app.ts", b"export function start(port: number): void {}\n");
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));

        let run = orchestrator(Arc::clone(&provider))
            .generate_project(dir.path())
            .await
            .unwrap();

        assert_eq!(run.summary.files_seen, 2);
        assert_eq!(run.summary.files_analyzed, 1);
        assert!(run.failures.is_empty());
        assert!(run.fragments.contains(&UnitId::new("app.ts", "start")));
    }

    #[tokio::test]
    async fn test_cancelled_run_records_every_unit() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.py", b"def one():\n    pass\n\ndef two():\n    pass\n");
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let orchestrator = orchestrator(Arc::clone(&provider));
        orchestrator.cancellation().cancel();

        let run = orchestrator.generate_project(dir.path()).await.unwrap();

        assert_eq!(provider.calls(), 0);
        assert!(run.summary.cancelled);
        assert_eq!(run.summary.units_failed[&FailureKind::Cancelled], 2);
        assert!(run.fragments.is_empty());
    }

    #[tokio::test]
    async fn test_fatal_errors_are_reported_per_unit() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.py", b"def one():\n    pass\n");
        let provider = Arc::new(ScriptedProvider::always(Err(ErrorCategory::Auth)));

        let run = orchestrator(provider).generate_project(dir.path()).await.unwrap();

        let failure = run.failures.get(&UnitId::new("a.py", "one")).unwrap();
        assert_eq!(failure.kind, FailureKind::Fatal);
        assert_eq!(failure.attempts, 1);
        assert!(run.to_string().contains("Failures:"));
    }

    #[tokio::test]
    async fn test_single_file_mode() {
        let dir = TempDir::new().unwrap();
        write(&dir, "solo.py", b"def only(x):\n    return x\n");
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));

        let run = orchestrator(provider)
            .generate_file(&dir.path().join("solo.py"))
            .await
            .unwrap();

        assert_eq!(run.summary.files_seen, 1);
        assert!(run.fragments.contains(&UnitId::new("solo.py", "only")));
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let err = orchestrator(provider)
            .generate_project(Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::Config(_)));
    }

    #[tokio::test]
    async fn test_no_adapters_is_fatal() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let orchestrator = orchestrator(provider)
            .with_analyzer(CodeAnalyzer::with_adapters(Vec::new(), Default::default()));

        let err = orchestrator.generate_project(dir.path()).await.unwrap_err();
        assert!(matches!(err, DocError::Config(_)));
    }
}
