//! Core Types
//!
//! Language-agnostic representation of analyzed source code.
//!
//! A [`SourceFile`] owns its [`SourceUnit`]s in lexical order. Units form a
//! tree through their `parent` identifier, which is a lookup key only.

pub mod error;

pub use error::{DocError, ErrorCategory, ErrorClassifier, LlmError, Result};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analyzer::parser::Language;

// =============================================================================
// Unit Identity
// =============================================================================

/// Stable identifier of a documentable unit: `<path>::<qualified name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(path: &str, qualified_name: &str) -> Self {
        Self(format!("{}::{}", path, qualified_name))
    }

    /// Identifier used for file-level records (e.g. a total parse failure)
    pub fn for_file(path: &str) -> Self {
        Self(path.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File path component of the identifier
    pub fn path(&self) -> &str {
        self.0.split_once("::").map(|(p, _)| p).unwrap_or(&self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Unit Kind & Style
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Module,
    Class,
    Function,
    Method,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Module => "module",
            UnitKind::Class => "class",
            UnitKind::Function => "function",
            UnitKind::Method => "method",
        }
    }

    /// Functions and methods carry parameters and bodies
    pub fn is_callable(&self) -> bool {
        matches!(self, UnitKind::Function | UnitKind::Method)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target output style of a generated fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocStyle {
    InlineComment,
    ApiDoc,
    Guide,
}

impl DocStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStyle::InlineComment => "inline-comment",
            DocStyle::ApiDoc => "api-doc",
            DocStyle::Guide => "guide",
        }
    }
}

impl fmt::Display for DocStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "inline-comment" | "inline" => Ok(DocStyle::InlineComment),
            "api-doc" | "api" => Ok(DocStyle::ApiDoc),
            "guide" => Ok(DocStyle::Guide),
            _ => Err(format!(
                "Unknown style: {}. Valid values: inline-comment, api-doc, guide",
                s
            )),
        }
    }
}

// =============================================================================
// Signals
// =============================================================================

/// Structural signal attached to a unit.
///
/// Local signals come from the language adapter; pattern and call-graph
/// signals come from the whole-file pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Signal {
    Unparsed,
    Async,
    Generator,
    Private,
    Test,
    Constructor,
    Deprecated,
    Factory,
    Builder,
    Singleton,
    Strategy,
    Observer,
    /// Caller side of an in-file call edge
    Calls(String),
    /// Callee side of an in-file call edge
    CalledBy(String),
}

impl Signal {
    /// Pattern tags (as opposed to modifiers or call edges)
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Signal::Factory | Signal::Builder | Signal::Singleton | Signal::Strategy | Signal::Observer
        )
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Unparsed => f.write_str("unparsed"),
            Signal::Async => f.write_str("async"),
            Signal::Generator => f.write_str("generator"),
            Signal::Private => f.write_str("private"),
            Signal::Test => f.write_str("test"),
            Signal::Constructor => f.write_str("constructor"),
            Signal::Deprecated => f.write_str("deprecated"),
            Signal::Factory => f.write_str("factory"),
            Signal::Builder => f.write_str("builder"),
            Signal::Singleton => f.write_str("singleton"),
            Signal::Strategy => f.write_str("strategy"),
            Signal::Observer => f.write_str("observer"),
            Signal::Calls(name) => write!(f, "calls:{}", name),
            Signal::CalledBy(name) => write!(f, "called-by:{}", name),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("calls:") {
            return Ok(Signal::Calls(name.to_string()));
        }
        if let Some(name) = s.strip_prefix("called-by:") {
            return Ok(Signal::CalledBy(name.to_string()));
        }
        match s {
            "unparsed" => Ok(Signal::Unparsed),
            "async" => Ok(Signal::Async),
            "generator" => Ok(Signal::Generator),
            "private" => Ok(Signal::Private),
            "test" => Ok(Signal::Test),
            "constructor" => Ok(Signal::Constructor),
            "deprecated" => Ok(Signal::Deprecated),
            "factory" => Ok(Signal::Factory),
            "builder" => Ok(Signal::Builder),
            "singleton" => Ok(Signal::Singleton),
            "strategy" => Ok(Signal::Strategy),
            "observer" => Ok(Signal::Observer),
            _ => Err(format!("Unknown signal: {}", s)),
        }
    }
}

impl From<Signal> for String {
    fn from(signal: Signal) -> Self {
        signal.to_string()
    }
}

impl TryFrom<String> for Signal {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Source Units
// =============================================================================

/// Location of a unit in its file (1-based lines, 0-based columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl SourceSpan {
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_line: start.row as u32 + 1,
            start_column: start.column as u32,
            end_line: end.row as u32 + 1,
            end_column: end.column as u32,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub declared_type: Option<String>,
    pub default_value: Option<String>,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            default_value: None,
        }
    }

    pub fn typed(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = Some(declared_type.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// One documentable element of a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub id: UnitId,
    /// Simple name (`add`, `Parser`)
    pub name: String,
    /// Dotted path from the outermost unit (`Parser.parse`)
    pub qualified_name: String,
    pub kind: UnitKind,
    pub span: SourceSpan,
    /// Declaration header without the body
    pub signature: String,
    /// Full source text of the unit
    pub text: String,
    /// Existing docstring or doc comment
    pub doc: Option<String>,
    pub parameters: Vec<ParamDescriptor>,
    pub return_type: Option<String>,
    /// Base classes, implemented traits or interfaces named in the declaration
    pub supertypes: Vec<String>,
    pub parent: Option<UnitId>,
    pub signals: BTreeSet<Signal>,
}

impl SourceUnit {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_unparsed(&self) -> bool {
        self.signals.contains(&Signal::Unparsed)
    }

    pub fn has_signal(&self, signal: &Signal) -> bool {
        self.signals.contains(signal)
    }

    /// Body text following the signature
    pub fn body(&self) -> &str {
        self.text
            .strip_prefix(self.signature.as_str())
            .unwrap_or(&self.text)
    }
}

/// Diagnostic recorded for a malformed span that was kept as an opaque unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Analyzed file. Built once by the analyzer and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub language: Language,
    #[serde(skip)]
    pub text: String,
    pub module_doc: Option<String>,
    /// Units sorted by start position
    pub units: Vec<SourceUnit>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl SourceFile {
    pub fn top_level(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units.iter().filter(|u| u.is_top_level())
    }

    pub fn unit(&self, id: &UnitId) -> Option<&SourceUnit> {
        self.units.iter().find(|u| &u.id == id)
    }

    pub fn parent_of(&self, unit: &SourceUnit) -> Option<&SourceUnit> {
        unit.parent.as_ref().and_then(|id| self.unit(id))
    }

    pub fn children<'a>(&'a self, id: &'a UnitId) -> impl Iterator<Item = &'a SourceUnit> + 'a {
        self.units
            .iter()
            .filter(move |u| u.parent.as_ref() == Some(id))
    }

    /// Units sharing the parent of `unit`, in lexical order, excluding `unit`
    pub fn siblings<'a>(&'a self, unit: &'a SourceUnit) -> impl Iterator<Item = &'a SourceUnit> + 'a {
        self.units
            .iter()
            .filter(move |u| u.parent == unit.parent && u.id != unit.id)
    }

    /// True when the adapter produced nothing but diagnostics
    pub fn is_total_failure(&self) -> bool {
        !self.diagnostics.is_empty() && self.units.iter().all(|u| u.is_unparsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_format() {
        let id = UnitId::new("src/math.py", "Calc.add");
        assert_eq!(id.as_str(), "src/math.py::Calc.add");
        assert_eq!(id.path(), "src/math.py");
        assert_eq!(UnitId::for_file("src/math.py").path(), "src/math.py");
    }

    #[test]
    fn test_signal_tags() {
        assert_eq!(Signal::Factory.to_string(), "factory");
        assert_eq!(Signal::Calls("helper".into()).to_string(), "calls:helper");
        assert_eq!(
            "called-by:main".parse::<Signal>(),
            Ok(Signal::CalledBy("main".into()))
        );
        assert!("bogus".parse::<Signal>().is_err());
        assert!(Signal::Strategy.is_pattern());
        assert!(!Signal::Async.is_pattern());
    }

    #[test]
    fn test_signal_serializes_as_tag() {
        let mut signals = BTreeSet::new();
        signals.insert(Signal::Singleton);
        signals.insert(Signal::Calls("load".into()));
        let json = serde_json::to_string(&signals).unwrap();
        assert_eq!(json, r#"["singleton","calls:load"]"#);
        let back: BTreeSet<Signal> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signals);
    }

    #[test]
    fn test_doc_style_parse() {
        assert_eq!("api-doc".parse::<DocStyle>(), Ok(DocStyle::ApiDoc));
        assert_eq!("inline_comment".parse::<DocStyle>(), Ok(DocStyle::InlineComment));
        assert!("poem".parse::<DocStyle>().is_err());
        assert_eq!(
            serde_json::to_string(&DocStyle::InlineComment).unwrap(),
            "\"inline-comment\""
        );
    }

    #[test]
    fn test_unit_body() {
        let unit = SourceUnit {
            id: UnitId::new("a.py", "f"),
            name: "f".into(),
            qualified_name: "f".into(),
            kind: UnitKind::Function,
            span: SourceSpan::default(),
            signature: "def f(x):".into(),
            text: "def f(x):\n    return x".into(),
            doc: None,
            parameters: vec![ParamDescriptor::new("x")],
            return_type: None,
            supertypes: vec![],
            parent: None,
            signals: BTreeSet::new(),
        };
        assert_eq!(unit.body(), "\n    return x");
        assert!(unit.is_top_level());
        assert!(!unit.is_unparsed());
    }
}
