use super::traits::{
    Extraction, LanguageAdapter, Scope, SyntaxTree, UnitCollector, UnitDraft, base_type_name,
    field_text, get_node_text, looks_like_declaration, named_children, naming_signals,
    signature_text, tokenize_with,
};
use super::Language;
use crate::types::{ParamDescriptor, Result, Signal, SourceUnit, UnitKind};

pub struct PythonAdapter;

impl PythonAdapter {
    pub fn new() -> Result<Self> {
        // Validate that the language is available
        let _ = super::traits::create_ts_parser(tree_sitter_python::LANGUAGE, "Python")?;
        Ok(Self)
    }
}

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn tokenize(&self, content: &str) -> Result<SyntaxTree> {
        tokenize_with(tree_sitter_python::LANGUAGE, "Python", content)
    }

    fn extract_units(&self, tree: &SyntaxTree, path: &str) -> Extraction {
        let content = tree.bytes();
        let root = tree.root();
        let mut collector = UnitCollector::new(path, content);
        visit_block(root, content, None, &mut collector);
        collector.finish(block_docstring(root, content))
    }

    fn extract_signals(&self, tree: &SyntaxTree, units: &mut [SourceUnit]) {
        let content = tree.bytes();
        for unit in units.iter_mut() {
            if unit.is_unparsed() {
                continue;
            }
            let Some(node) = tree.node_for_span(&unit.span) else {
                continue;
            };
            let mut signals = naming_signals(unit);

            if unit.kind.is_callable() {
                let mut cursor = node.walk();
                if node.children(&mut cursor).any(|c| c.kind() == "async") {
                    signals.push(Signal::Async);
                }
                if node
                    .child_by_field_name("body")
                    .is_some_and(contains_yield)
                {
                    signals.push(Signal::Generator);
                }
            }

            let name = unit.name.as_str();
            if name.starts_with('_') && !(name.starts_with("__") && name.ends_with("__")) {
                signals.push(Signal::Private);
            }
            if name.starts_with("test_") || (unit.kind == UnitKind::Class && name.starts_with("Test")) {
                signals.push(Signal::Test);
            }
            if unit.kind == UnitKind::Method && matches!(name, "__init__" | "__new__") {
                signals.push(Signal::Constructor);
            }

            if let Some(decorated) = node.parent().filter(|p| p.kind() == "decorated_definition") {
                let deprecated = named_children(decorated)
                    .into_iter()
                    .filter(|c| c.kind() == "decorator")
                    .any(|d| get_node_text(d, content).to_lowercase().contains("deprecated"));
                if deprecated {
                    signals.push(Signal::Deprecated);
                }
            }

            unit.signals.extend(signals);
        }
    }
}

fn visit_block(
    block: tree_sitter::Node,
    content: &[u8],
    parent: Option<&Scope>,
    collector: &mut UnitCollector,
) {
    for child in named_children(block) {
        let definition = if child.kind() == "decorated_definition" {
            match child.child_by_field_name("definition") {
                Some(def) => def,
                None => {
                    collector.push_opaque(child, parent);
                    continue;
                }
            }
        } else {
            child
        };

        match definition.kind() {
            "function_definition" => {
                let name = field_text(definition, "name", content);
                match name {
                    Some(name) if !definition.has_error() => {
                        let kind = if parent.is_some() {
                            UnitKind::Method
                        } else {
                            UnitKind::Function
                        };
                        let body = definition.child_by_field_name("body");
                        let mut draft =
                            UnitDraft::new(name, kind, signature_text(definition, body, content));
                        draft.doc = body.and_then(|b| block_docstring(b, content));
                        draft.parameters = definition
                            .child_by_field_name("parameters")
                            .map(|p| parse_parameters(p, content))
                            .unwrap_or_default();
                        draft.return_type =
                            field_text(definition, "return_type", content).map(str::to_string);
                        collector.push(definition, draft, parent);
                    }
                    _ => {
                        collector.push_opaque(definition, parent);
                    }
                }
            }
            "class_definition" => {
                let Some(name) = field_text(definition, "name", content) else {
                    collector.push_opaque(definition, parent);
                    continue;
                };
                let body = definition.child_by_field_name("body");
                let mut draft =
                    UnitDraft::new(name, UnitKind::Class, signature_text(definition, body, content));
                draft.doc = body.and_then(|b| block_docstring(b, content));
                draft.supertypes = definition
                    .child_by_field_name("superclasses")
                    .map(|args| {
                        named_children(args)
                            .into_iter()
                            .filter(|a| matches!(a.kind(), "identifier" | "attribute"))
                            .map(|a| base_type_name(get_node_text(a, content)).to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                let scope = collector.push(definition, draft, parent);
                if let Some(body) = body {
                    visit_block(body, content, Some(&scope), collector);
                }
            }
            "ERROR" => {
                let text = get_node_text(definition, content);
                if looks_like_declaration(text) {
                    collector.push_opaque(definition, parent);
                } else {
                    collector.diagnostic(definition, "syntax error");
                }
            }
            _ => {}
        }
    }
}

/// First string statement of a block, without quotes
fn block_docstring(block: tree_sitter::Node, content: &[u8]) -> Option<String> {
    let first = named_children(block)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0).filter(|n| n.kind() == "string")?;
    let raw = get_node_text(string, content);
    let trimmed = raw.trim_start_matches(['r', 'R', 'u', 'U', 'b', 'B', 'f', 'F']);
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| trimmed.strip_prefix(q).and_then(|s| s.strip_suffix(q)))?;

    let cleaned: Vec<&str> = inner.lines().map(str::trim).collect();
    let joined = cleaned.join("\n").trim().to_string();
    (!joined.is_empty()).then_some(joined)
}

fn parse_parameters(params: tree_sitter::Node, content: &[u8]) -> Vec<ParamDescriptor> {
    named_children(params)
        .into_iter()
        .filter_map(|p| {
            let param = match p.kind() {
                "identifier" => ParamDescriptor::new(get_node_text(p, content)),
                "typed_parameter" => {
                    let name = p.named_child(0).map(|n| get_node_text(n, content))?;
                    let mut param = ParamDescriptor::new(name);
                    if let Some(t) = field_text(p, "type", content) {
                        param = param.typed(t);
                    }
                    param
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = field_text(p, "name", content)?;
                    let mut param = ParamDescriptor::new(name);
                    if let Some(t) = field_text(p, "type", content) {
                        param = param.typed(t);
                    }
                    if let Some(v) = field_text(p, "value", content) {
                        param = param.with_default(v);
                    }
                    param
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    ParamDescriptor::new(get_node_text(p, content))
                }
                _ => return None,
            };
            (!matches!(param.name.as_str(), "self" | "cls")).then_some(param)
        })
        .collect()
}

fn contains_yield(node: tree_sitter::Node) -> bool {
    if node.kind() == "yield" {
        return true;
    }
    if matches!(node.kind(), "function_definition" | "lambda" | "class_definition") {
        return false;
    }
    named_children(node).into_iter().any(contains_yield)
}
