//! Documentation Evaluation
//!
//! Scores each fragment on four independent axes:
//!
//! | Axis | Measures |
//! |------|----------|
//! | completeness | unit facets (name, parameters, return, raised errors, side effects, members) covered |
//! | precision | reference overlap, or agreement with the real signature |
//! | clarity | sentence length and the sections the style calls for |
//! | utility | examples, guidance, the "why", and content beyond the code |
//!
//! The aggregate is a weighted mean (equal weights unless configured).
//! Project reports keep every per-unit breakdown.

pub mod report;
pub mod scorers;

pub use report::{EvaluationReport, UnitEvaluation};
pub use scorers::{FacetCoverage, PrecisionMode};

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ScoreWeights;
use crate::generation::{DocumentationFragment, FragmentStore};
use crate::types::{SourceFile, SourceUnit, UnitId};

/// Four sub-scores plus their weighted aggregate, each in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScore {
    pub completeness: f64,
    pub precision: f64,
    pub clarity: f64,
    pub utility: f64,
    pub aggregate: f64,
}

impl EvaluationScore {
    fn weighted(completeness: f64, precision: f64, clarity: f64, utility: f64, w: &ScoreWeights) -> Self {
        let aggregate = w.completeness * completeness
            + w.precision * precision
            + w.clarity * clarity
            + w.utility * utility;
        Self {
            completeness,
            precision,
            clarity,
            utility,
            aggregate: aggregate.clamp(0.0, 1.0),
        }
    }

    /// Component-wise mean; default for an empty slice
    pub fn mean(scores: &[EvaluationScore]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let n = scores.len() as f64;
        let sum = |f: fn(&EvaluationScore) -> f64| scores.iter().map(f).sum::<f64>() / n;
        Self {
            completeness: sum(|s| s.completeness),
            precision: sum(|s| s.precision),
            clarity: sum(|s| s.clarity),
            utility: sum(|s| s.utility),
            aggregate: sum(|s| s.aggregate),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    weights: ScoreWeights,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(ScoreWeights::default())
    }
}

impl Evaluator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self {
            weights: weights.normalized(),
        }
    }

    /// Score one fragment against the unit it documents
    pub fn score(
        &self,
        file: &SourceFile,
        unit: &SourceUnit,
        fragment: &DocumentationFragment,
        reference: Option<&str>,
    ) -> UnitEvaluation {
        let text = fragment.text.as_str();
        let style = fragment.style;

        let facets = scorers::completeness(file, unit, text);
        let (precision, precision_mode) = scorers::precision(unit, text, reference);
        let clarity = scorers::clarity(unit, style, text);
        let utility = scorers::utility(unit, style, text);

        let score = EvaluationScore::weighted(facets.ratio(), precision, clarity, utility, &self.weights);
        debug!(unit = %unit.id, aggregate = score.aggregate, "Scored fragment");

        UnitEvaluation {
            unit_id: unit.id.clone(),
            style,
            score,
            precision_mode,
            facets,
        }
    }

    /// Score every fragment whose unit can be found in `files`.
    ///
    /// Fragments without a matching unit are listed as unscored.
    pub fn evaluate_project(
        &self,
        files: &[SourceFile],
        store: &FragmentStore,
        references: &BTreeMap<UnitId, String>,
    ) -> EvaluationReport {
        let by_path: HashMap<&str, &SourceFile> =
            files.iter().map(|f| (f.path.as_str(), f)).collect();

        let mut units = BTreeMap::new();
        let mut unscored = Vec::new();

        for fragment in store.iter() {
            let id = &fragment.unit_id;
            let found = by_path
                .get(id.path())
                .and_then(|file| file.unit(id).map(|unit| (*file, unit)));
            let Some((file, unit)) = found else {
                warn!("No source unit for fragment {}", id);
                unscored.push(id.clone());
                continue;
            };
            let reference = references.get(id).map(String::as_str);
            units.insert(id.clone(), self.score(file, unit, fragment, reference));
        }

        EvaluationReport::new(units, unscored)
    }
}
