//! Evaluate Command
//!
//! Scores previously generated fragments against the current sources.
//!
//! Usage:
//!   docloom evaluate docs.json [--path .] [--references refs.json] [-o report.json]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::load_config;
use crate::analyzer::CodeAnalyzer;
use crate::cli::ui::Output;
use crate::evaluation::Evaluator;
use crate::generation::FragmentStore;
use crate::types::{DocError, Result, SourceFile, UnitId};

#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    /// Output of `docloom generate`, or a bare fragment map
    pub fragments: PathBuf,
    /// Root the fragment paths are relative to (or the documented file)
    pub path: PathBuf,
    /// JSON object of unit id -> reference documentation
    pub references: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// How many of the lowest-scoring units to list
    pub weakest: usize,
}

pub fn run(options: EvaluateOptions) -> Result<()> {
    let config = load_config(options.config.as_deref())?;
    let store = read_fragments(&options.fragments)?;
    let references = match &options.references {
        Some(path) => read_references(path)?,
        None => BTreeMap::new(),
    };

    let analyzer = CodeAnalyzer::new(&config.analysis)?;
    let files = analyze_sources(&analyzer, &options.path, &store);
    info!(
        "Evaluating {} fragments across {} files ({} references)",
        store.len(),
        files.len(),
        references.len()
    );

    let report = Evaluator::new(config.evaluation.weights)
        .evaluate_project(&files, &store, &references);

    let output = Output::new();
    if let Some(path) = &options.output {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        output.success(&format!("Wrote {}", path.display()));
    }
    output.report(&report, options.weakest);
    Ok(())
}

/// Accepts either a full run (`{"fragments": ..., "summary": ...}`) or the fragment map alone
fn read_fragments(path: &Path) -> Result<FragmentStore> {
    let content = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let fragments = match value {
        serde_json::Value::Object(mut run) if run.get("fragments").is_some_and(|v| v.is_object()) => {
            run.remove("fragments").unwrap_or_default()
        }
        other => other,
    };
    Ok(serde_json::from_value(fragments)?)
}

fn read_references(path: &Path) -> Result<BTreeMap<UnitId, String>> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        DocError::EvaluationInput(format!("{}: {}", path.display(), e))
    })
}

/// Re-analyze each file the store references.
///
/// Files that can no longer be analyzed are skipped; their fragments end up unscored.
fn analyze_sources(analyzer: &CodeAnalyzer, root: &Path, store: &FragmentStore) -> Vec<SourceFile> {
    let paths: BTreeSet<&str> = store.iter().map(|f| f.unit_id.path()).collect();

    paths
        .into_iter()
        .filter_map(|label| {
            let path = if root.is_file() {
                root.to_path_buf()
            } else {
                root.join(label)
            };
            match analyzer.analyze_as(&path, label) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("Cannot re-analyze {}: {}", label, e);
                    None
                }
            }
        })
        .collect()
}
