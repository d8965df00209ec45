use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use super::Language;
use crate::types::{
    DocError, ParamDescriptor, ParseDiagnostic, Result, Signal, SourceFile, SourceSpan, SourceUnit,
    UnitId, UnitKind,
};

/// Parsed tree together with the text it was parsed from
pub struct SyntaxTree {
    pub tree: tree_sitter::Tree,
    pub source: String,
}

impl SyntaxTree {
    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    /// Smallest node covering exactly the given span
    pub fn node_for_span(&self, span: &SourceSpan) -> Option<tree_sitter::Node<'_>> {
        let node = self
            .root()
            .descendant_for_byte_range(span.start_byte, span.end_byte)?;
        (node.start_byte() == span.start_byte && node.end_byte() == span.end_byte).then_some(node)
    }
}

/// Units and diagnostics produced by one adapter pass
#[derive(Debug, Default)]
pub struct Extraction {
    pub units: Vec<SourceUnit>,
    pub module_doc: Option<String>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Capability set every language adapter implements.
///
/// The analyzer only ever talks to adapters through this trait.
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> Language;

    /// Run the grammar over the text
    fn tokenize(&self, content: &str) -> Result<SyntaxTree>;

    /// Collect documentable units in lexical order
    fn extract_units(&self, tree: &SyntaxTree, path: &str) -> Extraction;

    /// Attach signals visible from a single unit and its syntax
    fn extract_signals(&self, tree: &SyntaxTree, units: &mut [SourceUnit]);

    fn parse(&self, content: &str, path: &str) -> Result<SourceFile> {
        let tree = self.tokenize(content).map_err(|e| match e {
            DocError::Parse {
                line,
                column,
                message,
                ..
            } => DocError::parse(path, line, column, message),
            other => other,
        })?;
        let mut extraction = self.extract_units(&tree, path);
        self.extract_signals(&tree, &mut extraction.units);

        Ok(SourceFile {
            path: path.to_string(),
            language: self.language(),
            text: tree.source,
            module_doc: extraction.module_doc,
            units: extraction.units,
            diagnostics: extraction.diagnostics,
        })
    }
}

/// Create a tree-sitter parser for the given language.
pub fn create_ts_parser<L: Into<tree_sitter::Language>>(
    language: L,
    lang_name: &str,
) -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language.into())
        .map_err(|e| DocError::parse("", 1, 0, format!("Failed to set {} language: {}", lang_name, e)))?;
    Ok(parser)
}

/// Parse `content` with a fresh parser for `language`
pub fn tokenize_with<L: Into<tree_sitter::Language>>(
    language: L,
    lang_name: &str,
    content: &str,
) -> Result<SyntaxTree> {
    let mut parser = create_ts_parser(language, lang_name)?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| DocError::parse("", 1, 0, format!("Failed to parse {} file", lang_name)))?;
    Ok(SyntaxTree {
        tree,
        source: content.to_string(),
    })
}

/// Extract text content from a tree-sitter node.
/// Returns empty string if extraction fails (with debug logging).
#[inline]
pub fn get_node_text<'a>(node: tree_sitter::Node, content: &'a [u8]) -> &'a str {
    node.utf8_text(content).unwrap_or_else(|e| {
        tracing::debug!(
            "UTF-8 extraction failed at {}:{}-{}:{}: {}",
            node.start_position().row + 1,
            node.start_position().column,
            node.end_position().row + 1,
            node.end_position().column,
            e
        );
        ""
    })
}

/// Text of a named field, if present
pub fn field_text<'a>(node: tree_sitter::Node, field: &str, content: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|n| get_node_text(n, content))
        .filter(|s| !s.is_empty())
}

/// Declaration header: everything from the node start up to its body
pub fn signature_text(node: tree_sitter::Node, body: Option<tree_sitter::Node>, content: &[u8]) -> String {
    let end = body.map(|b| b.start_byte()).unwrap_or_else(|| node.end_byte());
    let start = node.start_byte().min(end);
    String::from_utf8_lossy(&content[start..end])
        .trim_end()
        .trim_end_matches(['{', ';'])
        .trim_end()
        .to_string()
}

/// Bare type name: `crate::Foo<T>`, `*Foo` and `Foo[T]` all give `Foo`
pub fn base_type_name(text: &str) -> &str {
    let text = text.trim().trim_start_matches(['&', '*']);
    let text = text.strip_prefix("mut ").unwrap_or(text);
    let text = text.split(['<', '[', '(']).next().unwrap_or(text);
    let text = text.rsplit("::").next().unwrap_or(text);
    text.rsplit('.').next().unwrap_or(text).trim()
}

/// Named children of a node, collected in order
pub fn named_children(node: tree_sitter::Node) -> Vec<tree_sitter::Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// First ERROR or MISSING node in pre-order, if the subtree contains one
pub fn first_error(node: tree_sitter::Node) -> Option<tree_sitter::Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Consecutive comments immediately above `node` (no blank line between)
pub fn leading_comments<'a>(
    node: tree_sitter::Node,
    content: &'a [u8],
    is_doc: impl Fn(&str) -> bool,
) -> Vec<&'a str> {
    let mut comments = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(prev) = current {
        let kind = prev.kind();
        if kind == "attribute_item" || kind == "decorator" {
            expected_row = prev.start_position().row;
            current = prev.prev_sibling();
            continue;
        }
        if !kind.contains("comment") || prev.end_position().row + 1 < expected_row {
            break;
        }
        let text = get_node_text(prev, content);
        if !is_doc(text) {
            break;
        }
        comments.push(text);
        expected_row = prev.start_position().row;
        current = prev.prev_sibling();
    }

    comments.reverse();
    comments
}

/// Strip comment markers from a block of doc comment lines
pub fn clean_comment(lines: &[&str]) -> Option<String> {
    let cleaned: Vec<String> = lines
        .iter()
        .flat_map(|block| block.lines())
        .map(|line| {
            let line = line.trim();
            let line = line
                .trim_start_matches("/**")
                .trim_end_matches("*/")
                .trim_start_matches("//!")
                .trim_start_matches("///")
                .trim_start_matches("//")
                .trim_start_matches('*');
            line.trim().to_string()
        })
        .collect();
    let joined = cleaned.join("\n").trim().to_string();
    (!joined.is_empty()).then_some(joined)
}

// =============================================================================
// Unit Collection
// =============================================================================

/// Parent reference used while collecting nested units
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: UnitId,
    pub qualified_name: String,
}

/// Fields an adapter fills in for one unit
#[derive(Debug, Clone)]
pub struct UnitDraft {
    pub name: String,
    pub kind: UnitKind,
    pub signature: String,
    pub doc: Option<String>,
    pub parameters: Vec<ParamDescriptor>,
    pub return_type: Option<String>,
    pub supertypes: Vec<String>,
}

impl UnitDraft {
    pub fn new(name: impl Into<String>, kind: UnitKind, signature: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            signature: signature.into(),
            doc: None,
            parameters: Vec::new(),
            return_type: None,
            supertypes: Vec::new(),
        }
    }
}

static RE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(fn|def|function|func|class|struct|enum|trait|interface|impl|mod|namespace|type)\b\s*(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)?",
    )
    .unwrap()
});

/// Builds [`SourceUnit`]s with unique identifiers in collection order
pub struct UnitCollector<'a> {
    path: &'a str,
    content: &'a [u8],
    units: Vec<SourceUnit>,
    seen: HashMap<String, usize>,
    diagnostics: Vec<ParseDiagnostic>,
}

impl<'a> UnitCollector<'a> {
    pub fn new(path: &'a str, content: &'a [u8]) -> Self {
        Self {
            path,
            content,
            units: Vec::new(),
            seen: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Add a unit spanning `node` and return its scope for nested units
    pub fn push(&mut self, node: tree_sitter::Node, draft: UnitDraft, parent: Option<&Scope>) -> Scope {
        self.push_with_signals(node, draft, parent, BTreeSet::new())
    }

    /// Keep a malformed span as an opaque unit and record a diagnostic
    pub fn push_opaque(&mut self, node: tree_sitter::Node, parent: Option<&Scope>) -> Scope {
        let text = get_node_text(node, self.content);
        let (kind, name) = guess_declaration(text, parent.is_some());
        let name = name.unwrap_or_else(|| format!("unparsed_L{}", node.start_position().row + 1));
        let signature = text.lines().next().unwrap_or_default().trim().to_string();

        let error_node = first_error(node).unwrap_or(node);
        let message = if error_node.is_missing() {
            format!("missing {}", error_node.kind())
        } else {
            "syntax error".to_string()
        };
        self.diagnostics.push(ParseDiagnostic {
            line: error_node.start_position().row as u32 + 1,
            column: error_node.start_position().column as u32,
            message: format!("{} in {}", message, name),
        });

        let mut signals = BTreeSet::new();
        signals.insert(Signal::Unparsed);
        self.push_with_signals(node, UnitDraft::new(name, kind, signature), parent, signals)
    }

    fn push_with_signals(
        &mut self,
        node: tree_sitter::Node,
        draft: UnitDraft,
        parent: Option<&Scope>,
        signals: BTreeSet<Signal>,
    ) -> Scope {
        let base = match parent {
            Some(scope) => format!("{}.{}", scope.qualified_name, draft.name),
            None => draft.name.clone(),
        };
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        let qualified_name = if *count == 1 {
            base
        } else {
            format!("{}#{}", base, count)
        };

        let id = UnitId::new(self.path, &qualified_name);
        self.units.push(SourceUnit {
            id: id.clone(),
            name: draft.name,
            qualified_name: qualified_name.clone(),
            kind: draft.kind,
            span: SourceSpan::from_node(node),
            signature: draft.signature,
            text: get_node_text(node, self.content).to_string(),
            doc: draft.doc,
            parameters: draft.parameters,
            return_type: draft.return_type,
            supertypes: draft.supertypes,
            parent: parent.map(|s| s.id.clone()),
            signals,
        });

        Scope { id, qualified_name }
    }

    /// Record a base type discovered after the unit was collected
    pub fn add_supertype(&mut self, scope: &Scope, supertype: &str) {
        if let Some(unit) = self.units.iter_mut().find(|u| u.id == scope.id)
            && !unit.supertypes.iter().any(|s| s == supertype)
        {
            unit.supertypes.push(supertype.to_string());
        }
    }

    /// Record a syntax error that produced no unit
    pub fn diagnostic(&mut self, node: tree_sitter::Node, message: impl Into<String>) {
        self.diagnostics.push(ParseDiagnostic {
            line: node.start_position().row as u32 + 1,
            column: node.start_position().column as u32,
            message: message.into(),
        });
    }

    /// Finish collection; units are returned sorted by position
    pub fn finish(mut self, module_doc: Option<String>) -> Extraction {
        self.units.sort_by_key(|u| (u.span.start_byte, u.span.end_byte));
        Extraction {
            units: self.units,
            module_doc,
            diagnostics: self.diagnostics,
        }
    }
}

/// True when an error span still reads like a declaration
pub fn looks_like_declaration(text: &str) -> bool {
    RE_DECLARATION.is_match(text)
}

/// Member declared by name alone, as in `async m() {` inside a class body
static RE_MEMBER_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:async|static|public|private|protected|readonly|override|abstract|get|set)\s+)*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*(?:<[^>]*>\s*)?\(",
    )
    .unwrap()
});

/// Words that can open a member head without naming a member
const NOT_MEMBER_NAMES: &[&str] =
    &["fn", "def", "function", "func", "if", "for", "while", "switch", "catch", "return", "new"];

/// Best-effort kind and name for a malformed declaration
pub fn guess_declaration(text: &str, nested: bool) -> (UnitKind, Option<String>) {
    if nested
        && let Some(name) = RE_MEMBER_HEAD
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| !NOT_MEMBER_NAMES.contains(name))
    {
        return (UnitKind::Method, Some(name.to_string()));
    }
    let Some(caps) = RE_DECLARATION.captures(text) else {
        return (fallback_kind(nested), None);
    };
    let keyword = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let name = caps.get(2).map(|m| m.as_str().to_string());
    let kind = match keyword {
        "class" | "struct" | "enum" | "trait" | "interface" | "impl" | "type" => UnitKind::Class,
        "mod" | "namespace" => UnitKind::Module,
        _ => fallback_kind(nested),
    };
    (kind, name)
}

fn fallback_kind(nested: bool) -> UnitKind {
    if nested {
        UnitKind::Method
    } else {
        UnitKind::Function
    }
}

// =============================================================================
// Shared Signal Rules
// =============================================================================

static RE_FACTORY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(create|make|build|new)(_[a-z0-9]|[A-Z])|Factory$|_factory$").unwrap()
});

/// Naming-based pattern tags shared by every language
pub fn naming_signals(unit: &SourceUnit) -> Vec<Signal> {
    let mut signals = Vec::new();
    let name = unit.name.as_str();

    match unit.kind {
        UnitKind::Class => {
            if name.ends_with("Builder") {
                signals.push(Signal::Builder);
            }
            if name.ends_with("Factory") {
                signals.push(Signal::Factory);
            }
            if name.ends_with("Singleton") {
                signals.push(Signal::Singleton);
            }
        }
        UnitKind::Function | UnitKind::Method => {
            if RE_FACTORY_NAME.is_match(name) {
                signals.push(Signal::Factory);
            }
        }
        UnitKind::Module => {}
    }

    let deprecated_doc = unit
        .doc
        .as_deref()
        .is_some_and(|d| d.to_lowercase().contains("deprecated"));
    if deprecated_doc {
        signals.push(Signal::Deprecated);
    }

    signals
}
