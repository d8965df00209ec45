//! Evaluation report: per-unit breakdown plus the project mean.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EvaluationScore, FacetCoverage, PrecisionMode};
use crate::types::{DocStyle, UnitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEvaluation {
    pub unit_id: UnitId,
    pub style: DocStyle,
    pub score: EvaluationScore,
    pub precision_mode: PrecisionMode,
    pub facets: FacetCoverage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Mean of per-unit scores
    pub mean: EvaluationScore,
    pub units: BTreeMap<UnitId, UnitEvaluation>,
    /// Fragments whose unit was not found in the analyzed sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unscored: Vec<UnitId>,
}

impl EvaluationReport {
    pub fn new(units: BTreeMap<UnitId, UnitEvaluation>, unscored: Vec<UnitId>) -> Self {
        let scores: Vec<EvaluationScore> = units.values().map(|u| u.score).collect();
        Self {
            mean: EvaluationScore::mean(&scores),
            units,
            unscored,
        }
    }

    /// Units in ascending aggregate order
    pub fn weakest(&self, limit: usize) -> Vec<&UnitEvaluation> {
        let mut units: Vec<_> = self.units.values().collect();
        units.sort_by(|a, b| a.score.aggregate.total_cmp(&b.score.aggregate));
        units.truncate(limit);
        units
    }

    pub fn degraded_count(&self) -> usize {
        self.units
            .values()
            .filter(|u| matches!(u.precision_mode, PrecisionMode::Degraded { .. }))
            .count()
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.mean;
        writeln!(f, "Units scored: {}", self.units.len())?;
        write!(
            f,
            "Mean: {:.2} (completeness {:.2}, precision {:.2}, clarity {:.2}, utility {:.2})",
            m.aggregate, m.completeness, m.precision, m.clarity, m.utility
        )?;
        let degraded = self.degraded_count();
        if degraded > 0 {
            write!(f, "\nReferences unusable for {} units (self-consistency used)", degraded)?;
        }
        if !self.unscored.is_empty() {
            write!(f, "\nUnscored: {}", self.unscored.len())?;
        }
        Ok(())
    }
}
