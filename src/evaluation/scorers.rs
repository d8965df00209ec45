//! Sub-scorers
//!
//! Pure text heuristics over a fragment and the unit it documents. Every
//! function returns a value in `[0, 1]`.
//!
//! Signature restatements are removed before facet matching, so a fragment
//! that only repeats the code earns no credit for mentioning names.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{DocError, DocStyle, Result, Signal, SourceFile, SourceUnit};

static RE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

// -----------------------------------------------------------------------------
// Code-side facets
// -----------------------------------------------------------------------------

static RE_RETURN_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breturn\s+[^\s;})]|\byield\b").unwrap());

static RE_RAISES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\braise\b|\bthrow\b|panic!|\bErr\(|errors\.New|fmt\.Errorf|\?\s*[;)]").unwrap()
});

static RE_SIDE_EFFECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bprint\(|println!|eprintln!|console\.\w+\(|\bopen\(|\.write\w*\(|fs::|\bos\.\w+\(|\blog(?:ger)?\.\w+\(|fmt\.Print|\b(?:self|this)\.\w+\s*(?:=[^=]|\+=|-=)|\bglobal\b",
    )
    .unwrap()
});

// -----------------------------------------------------------------------------
// Fragment-side mentions
// -----------------------------------------------------------------------------

static RE_MENTIONS_RETURN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(returns?|returned|returning|yields?|results?|produces?|outputs?)\b").unwrap()
});

static RE_MENTIONS_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(raises?|raised|throws?|thrown|errors?|exceptions?|panics?|fails?|failure)\b")
        .unwrap()
});

static RE_MENTIONS_SIDE_EFFECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(writes?|written|prints?|logs?|modif(y|ies|ied)|mutates?|updates?|side[- ]effects?|stores?|saves?|opens?|sets?|emits?)\b",
    )
    .unwrap()
});

static RE_PARAMS_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#+\s*|\*\*)?(parameters|params|arguments|args)\b").unwrap()
});

static RE_OTHER_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#+\s*|\*\*)?(returns?|raises|errors|panics|throws|examples?|notes?|yields?|usage|see also)\b",
    )
    .unwrap()
});

static RE_MARKDOWN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*#{1,6}\s+\S").unwrap());

static RE_PARAM_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+]\s+)?`?([A-Za-z_][A-Za-z0-9_]*)`?\s*(?:\(([^)]*)\))?\s*[:-]").unwrap()
});

static RE_SPHINX_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":param\s+(?:(\S+)\s+)?(\w+)\s*:").unwrap());

static RE_JSDOC_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@param\s+(?:\{([^}]*)\}\s+)?\[?(\w+)").unwrap());

static RE_SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?]+(?:\s+|$)|\n\s*\n|\n\s*(?:[-*+]|\d+\.)\s+|\n\s*#+\s*").unwrap()
});

static RE_GUIDANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(use|call|pass|configure|run|should|must|avoid|prefer|make sure|note|ensure|instead|before|after)\b",
    )
    .unwrap()
});

static RE_WHY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(because|so that|in order to|to avoid|otherwise|since|ensures?|prevents?|required|why|guarantees?)\b",
    )
    .unwrap()
});

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "this", "that", "with", "are", "was", "from", "into", "its", "has",
    "have", "not", "but", "all", "any", "can", "will", "when", "then", "than", "which", "each",
    "one", "two", "also", "been", "their", "there", "these", "those", "such", "via", "out",
];

const RECEIVERS: &[&str] = &["self", "cls", "this"];

// =============================================================================
// Text helpers
// =============================================================================

fn words(text: &str) -> impl Iterator<Item = &str> {
    RE_WORD.find_iter(text).map(|m| m.as_str())
}

fn word_set(text: &str) -> HashSet<String> {
    words(text).map(str::to_lowercase).collect()
}

fn content_words(text: &str) -> Vec<String> {
    words(text)
        .map(str::to_lowercase)
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Fragment text with fenced code blocks removed
fn without_code_blocks(text: &str) -> String {
    let mut in_fence = false;
    let mut kept = Vec::new();
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            kept.push(line);
        }
    }
    kept.join("\n")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Descriptive prose only: no code blocks, no copy of the signature and no
/// bare call form of the unit.
pub fn prose(unit: &SourceUnit, text: &str) -> String {
    let mut prose = collapse(&without_code_blocks(text));
    let signature = collapse(&unit.signature);
    if !signature.is_empty() {
        prose = prose.replace(&signature, " ");
    }
    if let Ok(call_form) = Regex::new(&format!(r"\b{}\s*\([^)]*\)", regex::escape(&unit.name))) {
        prose = call_form.replace_all(&prose, " ").into_owned();
    }
    prose
}

fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn has_return_value(unit: &SourceUnit) -> bool {
    if !unit.kind.is_callable() {
        return false;
    }
    let declared = unit
        .return_type
        .as_deref()
        .map(str::trim)
        .is_some_and(|t| !matches!(t, "" | "None" | "()" | "void" | "never" | "-> None" | "-> ()"));
    declared || unit.has_signal(&Signal::Generator) || RE_RETURN_VALUE.is_match(unit.body())
}

fn param_name(raw: &str) -> &str {
    raw.trim_start_matches(['*', '&', '.'])
}

/// Names shorter than this collide with ordinary words (`a`, `i`, `by`)
const SHORT_PARAM_LEN: usize = 3;

/// A short name counts only as a code span or a `name:` lead-in
fn short_param_mentioned(name: &str, prose: &str) -> bool {
    if prose.contains(&format!("`{}`", name)) {
        return true;
    }
    Regex::new(&format!(r"(?:^|[\s(\[])\*{{0,2}}{}\*{{0,2}}\s*:", regex::escape(name)))
        .is_ok_and(|re| re.is_match(prose))
}

fn actual_params(unit: &SourceUnit) -> Vec<&str> {
    unit.parameters
        .iter()
        .map(|p| param_name(&p.name))
        .filter(|name| !name.is_empty() && !RECEIVERS.contains(name))
        .collect()
}

// =============================================================================
// Completeness
// =============================================================================

/// Facets of the unit found in, or missing from, the fragment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetCoverage {
    pub covered: Vec<String>,
    pub missing: Vec<String>,
}

impl FacetCoverage {
    fn check(&mut self, facet: String, present: bool) {
        if present {
            self.covered.push(facet);
        } else {
            self.missing.push(facet);
        }
    }

    /// Covered share; a unit without facets is complete
    pub fn ratio(&self) -> f64 {
        let total = self.covered.len() + self.missing.len();
        if total == 0 {
            1.0
        } else {
            self.covered.len() as f64 / total as f64
        }
    }
}

pub fn completeness(file: &SourceFile, unit: &SourceUnit, text: &str) -> FacetCoverage {
    let prose = prose(unit, text);
    let lowered = prose.to_lowercase();
    let vocabulary = word_set(&prose);
    let mut coverage = FacetCoverage::default();

    coverage.check(
        format!("name:{}", unit.name),
        lowered.contains(&unit.name.to_lowercase()),
    );

    let listed: HashSet<String> = documented_params(text).into_iter().map(|(name, _)| name).collect();
    for name in actual_params(unit) {
        let present = if name.chars().count() < SHORT_PARAM_LEN {
            listed.contains(name) || short_param_mentioned(name, &prose)
        } else {
            vocabulary.contains(&name.to_lowercase())
        };
        coverage.check(format!("param:{}", name), present);
    }

    if has_return_value(unit) {
        coverage.check("returns".to_string(), RE_MENTIONS_RETURN.is_match(&prose));
    }

    let body = unit.body();
    if unit.kind.is_callable() && RE_RAISES.is_match(body) {
        coverage.check("raises".to_string(), RE_MENTIONS_ERROR.is_match(&prose));
    }
    if unit.kind.is_callable() && RE_SIDE_EFFECT.is_match(body) {
        coverage.check(
            "side-effects".to_string(),
            RE_MENTIONS_SIDE_EFFECT.is_match(&prose),
        );
    }

    let children: BTreeSet<&str> = file.children(&unit.id).map(|c| c.name.as_str()).collect();
    for child in children {
        coverage.check(format!("member:{}", child), lowered.contains(&child.to_lowercase()));
    }

    coverage
}

// =============================================================================
// Precision
// =============================================================================

/// How the precision sub-score was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum PrecisionMode {
    Reference,
    SelfConsistency,
    /// Reference was unusable; self-consistency was used instead
    Degraded { reason: String },
}

/// Word tokens of a reference, rejecting references with no words at all
pub fn reference_tokens(reference: &str) -> Result<HashSet<String>> {
    let tokens = word_set(reference);
    if tokens.is_empty() {
        return Err(DocError::EvaluationInput(
            "reference documentation contains no words".to_string(),
        ));
    }
    Ok(tokens)
}

/// Token-set F1 between fragment and reference
pub fn overlap_f1(text: &str, reference: &HashSet<String>) -> f64 {
    let candidate = word_set(text);
    if candidate.is_empty() || reference.is_empty() {
        return 0.0;
    }
    let shared = candidate.intersection(reference).count() as f64;
    if shared == 0.0 {
        return 0.0;
    }
    let precision = shared / candidate.len() as f64;
    let recall = shared / reference.len() as f64;
    clamp01(2.0 * precision * recall / (precision + recall))
}

/// Parameter names (with optional types) the fragment claims to document
pub fn documented_params(text: &str) -> Vec<(String, Option<String>)> {
    let mut found = Vec::new();
    let mut in_params = false;

    for line in text.lines() {
        if RE_PARAMS_HEADER.is_match(line) {
            in_params = true;
            continue;
        }
        if RE_OTHER_HEADER.is_match(line) {
            in_params = false;
            continue;
        }
        if in_params && let Some(caps) = RE_PARAM_ITEM.captures(line) {
            let name = caps[1].to_string();
            let declared = caps.get(2).map(|m| m.as_str().trim().to_string());
            found.push((name, declared.filter(|t| !t.is_empty())));
        }
    }

    for caps in RE_SPHINX_PARAM.captures_iter(text) {
        found.push((caps[2].to_string(), caps.get(1).map(|m| m.as_str().to_string())));
    }
    for caps in RE_JSDOC_PARAM.captures_iter(text) {
        found.push((caps[2].to_string(), caps.get(1).map(|m| m.as_str().to_string())));
    }

    let mut seen = HashSet::new();
    found.retain(|(name, _)| seen.insert(name.clone()));
    found
}

fn normalize_type(t: &str) -> String {
    t.chars()
        .filter(|c| !c.is_whitespace() && *c != '`')
        .collect::<String>()
        .to_lowercase()
}

fn types_agree(documented: &str, declared: &str) -> bool {
    let documented = normalize_type(documented);
    let declared = normalize_type(declared);
    documented.contains(&declared) || declared.contains(&documented)
}

/// Agreement between documented parameters and the real signature.
///
/// Nothing documented means nothing contradicted.
pub fn self_consistency(unit: &SourceUnit, text: &str) -> f64 {
    let documented = documented_params(text);
    if documented.is_empty() {
        return 1.0;
    }

    let mut agree = 0usize;
    let mut disagree = 0usize;
    for (name, documented_type) in &documented {
        if RECEIVERS.contains(&name.as_str()) {
            continue;
        }
        let actual = unit.parameters.iter().find(|p| param_name(&p.name) == name);
        match actual {
            None => disagree += 1,
            Some(param) => {
                agree += 1;
                if let (Some(doc_type), Some(decl_type)) = (documented_type, &param.declared_type)
                    && !types_agree(doc_type, decl_type)
                {
                    disagree += 1;
                }
            }
        }
    }

    if agree + disagree == 0 {
        return 1.0;
    }
    clamp01(agree as f64 / (agree + disagree) as f64)
}

pub fn precision(unit: &SourceUnit, text: &str, reference: Option<&str>) -> (f64, PrecisionMode) {
    match reference.map(reference_tokens) {
        Some(Ok(tokens)) => (overlap_f1(text, &tokens), PrecisionMode::Reference),
        Some(Err(err)) => {
            tracing::warn!(unit = %unit.id, "Falling back to self-consistency: {}", err);
            (
                self_consistency(unit, text),
                PrecisionMode::Degraded {
                    reason: err.to_string(),
                },
            )
        }
        None => (self_consistency(unit, text), PrecisionMode::SelfConsistency),
    }
}

// =============================================================================
// Clarity
// =============================================================================

/// `1 - clamp((avg_words - 15) / 25)`; fragments without sentences score 0
pub fn sentence_length_score(text: &str) -> f64 {
    let prose = without_code_blocks(text);
    let sentences: Vec<usize> = RE_SENTENCE_BREAK
        .split(&prose)
        .map(|s| words(s).count())
        .filter(|n| *n > 0)
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }
    let avg = sentences.iter().sum::<usize>() as f64 / sentences.len() as f64;
    clamp01(1.0 - ((avg - 15.0) / 25.0).clamp(0.0, 1.0))
}

fn has_summary(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .is_some_and(|first| {
            !first.starts_with('#')
                && !first.starts_with("```")
                && !first.starts_with(['-', '*', '+'])
                && words(first).count() >= 3
        })
}

fn documents_params(text: &str) -> bool {
    text.lines().any(|l| RE_PARAMS_HEADER.is_match(l))
        || RE_SPHINX_PARAM.is_match(text)
        || RE_JSDOC_PARAM.is_match(text)
}

fn has_example(text: &str) -> bool {
    text.contains("```")
        || text.lines().any(|l| {
            l.trim_start().starts_with(">>>")
                || (RE_OTHER_HEADER.is_match(l) && l.to_lowercase().contains("example"))
        })
}

/// Share of the sections the style calls for that are present
pub fn section_score(unit: &SourceUnit, style: DocStyle, text: &str) -> f64 {
    let mut required = vec![has_summary(text)];
    match style {
        DocStyle::ApiDoc => {
            if !actual_params(unit).is_empty() {
                required.push(documents_params(text));
            }
            if has_return_value(unit) {
                required.push(RE_MENTIONS_RETURN.is_match(text));
            }
        }
        DocStyle::Guide => required.push(has_example(text)),
        DocStyle::InlineComment => {}
    }

    let present = required.iter().filter(|p| **p).count() as f64;
    let mut score = present / required.len() as f64;
    if style == DocStyle::InlineComment && RE_MARKDOWN_HEADER.is_match(text) {
        score *= 0.5;
    }
    clamp01(score)
}

pub fn clarity(unit: &SourceUnit, style: DocStyle, text: &str) -> f64 {
    clamp01(0.6 * sentence_length_score(text) + 0.4 * section_score(unit, style, text))
}

// =============================================================================
// Utility
// =============================================================================

/// Share of descriptive words that do not already appear in the code
pub fn novelty(unit: &SourceUnit, text: &str) -> f64 {
    let described = content_words(&prose(unit, text));
    if described.is_empty() {
        return 0.0;
    }
    let code = word_set(&unit.text);
    let new = described.iter().filter(|w| !code.contains(*w)).count();
    clamp01(new as f64 / described.len() as f64)
}

pub fn utility(unit: &SourceUnit, style: DocStyle, text: &str) -> f64 {
    let prose = prose(unit, text);
    let novelty = novelty(unit, text);
    let guidance = RE_GUIDANCE.is_match(&prose);
    let why = RE_WHY.is_match(&prose);
    let flag = |b: bool| if b { 1.0 } else { 0.0 };

    let score = match style {
        DocStyle::Guide => 0.4 * flag(has_example(text)) + 0.4 * flag(guidance) + 0.2 * novelty,
        DocStyle::InlineComment => 0.6 * flag(why) + 0.4 * novelty,
        DocStyle::ApiDoc => {
            let actionable = has_example(text) || guidance || why;
            0.6 * novelty + 0.4 * flag(actionable)
        }
    };
    clamp01(score)
}
