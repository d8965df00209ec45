//! Fragment store and failure report.
//!
//! Both are keyed by [`UnitId`] and filled at a single aggregation point, so
//! a key is written by exactly one worker per run. Inserting an existing key
//! overwrites it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ai::TokenUsage;
use crate::types::{DocStyle, UnitId};

// =============================================================================
// Fragments
// =============================================================================

/// One model call as recorded for auditing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    /// `accepted`, `transient` or `fatal`
    pub outcome: String,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub model: String,
    pub template_id: String,
    pub attempts: u32,
    pub retries: u32,
    /// Cumulative latency of every attempt
    pub latency_ms: u64,
    /// Usage reported by the service, summed over the attempts that returned a completion
    #[serde(default)]
    pub usage: TokenUsage,
    pub attempt_log: Vec<AttemptRecord>,
    /// The prompt had context removed to fit its budget
    pub truncated: bool,
    pub generated_at: DateTime<Utc>,
}

/// Accepted documentation for one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationFragment {
    pub unit_id: UnitId,
    pub text: String,
    /// Format tag
    pub style: DocStyle,
    pub metadata: GenerationMetadata,
}

/// Fragments keyed by unit, at most one per unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentStore {
    fragments: BTreeMap<UnitId, DocumentationFragment>,
}

impl FragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, returning the fragment previously stored for the unit
    pub fn insert(&mut self, fragment: DocumentationFragment) -> Option<DocumentationFragment> {
        self.fragments.insert(fragment.unit_id.clone(), fragment)
    }

    pub fn get(&self, id: &UnitId) -> Option<&DocumentationFragment> {
        self.fragments.get(id)
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.fragments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragments in identifier order
    pub fn iter(&self) -> impl Iterator<Item = &DocumentationFragment> {
        self.fragments.values()
    }

    /// Unit identifiers grouped by directory, then by file
    pub fn index(&self) -> BTreeMap<String, BTreeMap<String, Vec<UnitId>>> {
        let mut index: BTreeMap<String, BTreeMap<String, Vec<UnitId>>> = BTreeMap::new();
        for id in self.fragments.keys() {
            let path = id.path();
            let dir = match path.rsplit_once('/') {
                Some((dir, _)) => dir.to_string(),
                None => ".".to_string(),
            };
            index
                .entry(dir)
                .or_default()
                .entry(path.to_string())
                .or_default()
                .push(id.clone());
        }
        index
    }

    /// SHA-256 over identifiers and text only, so runs that differ only in
    /// timing produce the same value.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (id, fragment) in &self.fragments {
            hasher.update(id.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(fragment.style.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(fragment.text.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

// =============================================================================
// Failures
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Unit kept as an opaque span by its adapter; never sent to the model
    Unparsed,
    UnsupportedLanguage,
    /// File could not be read or produced no units at all
    Analysis,
    RetriesExhausted,
    Fatal,
    /// Run cancelled before the request could finish
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unparsed => "unparsed",
            FailureKind::UnsupportedLanguage => "unsupported-language",
            FailureKind::Analysis => "analysis",
            FailureKind::RetriesExhausted => "retries-exhausted",
            FailureKind::Fatal => "fatal",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub unit_id: UnitId,
    pub kind: FailureKind,
    pub attempts: u32,
    /// Last error detail
    pub detail: String,
}

impl GenerationFailure {
    pub fn new(unit_id: UnitId, kind: FailureKind, attempts: u32, detail: impl Into<String>) -> Self {
        Self {
            unit_id,
            kind,
            attempts,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] after {} attempts: {}",
            self.unit_id, self.kind, self.attempts, self.detail
        )
    }
}

/// Failures keyed by unit (or by file for file-level failures)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureReport {
    failures: BTreeMap<UnitId, GenerationFailure>,
}

impl FailureReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, failure: GenerationFailure) {
        self.failures.insert(failure.unit_id.clone(), failure);
    }

    pub fn get(&self, id: &UnitId) -> Option<&GenerationFailure> {
        self.failures.get(id)
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GenerationFailure> {
        self.failures.values()
    }

    pub fn by_kind(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for failure in self.failures.values() {
            *counts.entry(failure.kind).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(id: &str, text: &str, latency_ms: u64) -> DocumentationFragment {
        DocumentationFragment {
            unit_id: UnitId::from(id),
            text: text.to_string(),
            style: DocStyle::ApiDoc,
            metadata: GenerationMetadata {
                model: "test".to_string(),
                template_id: "generic".to_string(),
                attempts: 1,
                retries: 0,
                latency_ms,
                usage: Default::default(),
                attempt_log: Vec::new(),
                truncated: false,
                generated_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_insert_overwrites() {
        let mut store = FragmentStore::new();
        assert!(store.insert(fragment("a.py::f", "first", 1)).is_none());
        let previous = store.insert(fragment("a.py::f", "second", 2)).unwrap();
        assert_eq!(previous.text, "first");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&UnitId::from("a.py::f")).unwrap().text, "second");
    }

    #[test]
    fn test_fingerprint_ignores_timing() {
        let mut a = FragmentStore::new();
        let mut b = FragmentStore::new();
        a.insert(fragment("a.py::f", "Doc.", 10));
        a.insert(fragment("b.py::g", "More.", 10));
        b.insert(fragment("b.py::g", "More.", 999));
        b.insert(fragment("a.py::f", "Doc.", 5));
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.insert(fragment("a.py::f", "Different.", 5));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_index_groups_by_dir_and_file() {
        let mut store = FragmentStore::new();
        store.insert(fragment("src/a.py::f", "x", 0));
        store.insert(fragment("src/a.py::g", "x", 0));
        store.insert(fragment("src/sub/b.py::h", "x", 0));
        store.insert(fragment("top.py::t", "x", 0));

        let index = store.index();
        let dirs: Vec<_> = index.keys().map(String::as_str).collect();
        assert_eq!(dirs, vec![".", "src", "src/sub"]);
        assert_eq!(index["src"]["src/a.py"].len(), 2);
        assert_eq!(index["."]["top.py"], vec![UnitId::from("top.py::t")]);
    }

    #[test]
    fn test_failure_report_counts() {
        let mut report = FailureReport::new();
        report.record(GenerationFailure::new("a.py::f".into(), FailureKind::Fatal, 1, "auth"));
        report.record(GenerationFailure::new("a.py::g".into(), FailureKind::Unparsed, 0, "syntax"));
        report.record(GenerationFailure::new("b.py".into(), FailureKind::Analysis, 0, "empty"));
        report.record(GenerationFailure::new("a.py::f".into(), FailureKind::Fatal, 1, "auth again"));

        assert_eq!(report.len(), 3);
        let counts = report.by_kind();
        assert_eq!(counts[&FailureKind::Fatal], 1);
        assert_eq!(counts[&FailureKind::Unparsed], 1);
        assert!(report.get(&"a.py::f".into()).unwrap().detail.contains("again"));
    }

    #[test]
    fn test_store_serializes_as_map() {
        let mut store = FragmentStore::new();
        store.insert(fragment("a.py::f", "Doc.", 1));
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["a.py::f"]["text"], "Doc.");
        assert_eq!(json["a.py::f"]["style"], "api-doc");
    }
}
