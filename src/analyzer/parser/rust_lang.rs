use std::collections::HashMap;

use super::traits::{
    Extraction, LanguageAdapter, Scope, SyntaxTree, UnitCollector, UnitDraft, base_type_name,
    clean_comment, field_text, get_node_text, leading_comments, looks_like_declaration,
    named_children, naming_signals, signature_text, tokenize_with,
};
use super::Language;
use crate::types::{ParamDescriptor, Result, Signal, SourceUnit, UnitKind};

pub struct RustAdapter;

impl RustAdapter {
    pub fn new() -> Result<Self> {
        // Validate that the language is available
        let _ = super::traits::create_ts_parser(tree_sitter_rust::LANGUAGE, "Rust")?;
        Ok(Self)
    }
}

impl LanguageAdapter for RustAdapter {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn tokenize(&self, content: &str) -> Result<SyntaxTree> {
        tokenize_with(tree_sitter_rust::LANGUAGE, "Rust", content)
    }

    fn extract_units(&self, tree: &SyntaxTree, path: &str) -> Extraction {
        let content = tree.bytes();
        let root = tree.root();
        let mut collector = UnitCollector::new(path, content);
        visit_items(root, content, None, &mut collector);
        collector.finish(inner_doc(root, content))
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
            let attributes = preceding_attributes(node, content);

            if unit.kind.is_callable()
                && unit
                    .signature
                    .split("fn ")
                    .next()
                    .is_some_and(|prefix| prefix.contains("async"))
            {
                signals.push(Signal::Async);
            }
            if attributes.iter().any(|a| a.contains("test")) || unit.name.starts_with("test_") {
                signals.push(Signal::Test);
            }
            if attributes.iter().any(|a| a.contains("deprecated")) {
                signals.push(Signal::Deprecated);
            }
            if unit.kind == UnitKind::Method && unit.name == "new" {
                signals.push(Signal::Constructor);
            }
            if !has_visibility(node) && !is_implicitly_public(node) {
                signals.push(Signal::Private);
            }

            unit.signals.extend(signals);
        }
    }
}

fn visit_items(
    container: tree_sitter::Node,
    content: &[u8],
    parent: Option<&Scope>,
    collector: &mut UnitCollector,
) {
    let mut types: HashMap<String, Scope> = HashMap::new();
    let mut impls = Vec::new();

    for item in named_children(container) {
        match item.kind() {
            // Free functions inside a module stay functions
            "function_item" => push_function(item, content, UnitKind::Function, parent, collector),
            "struct_item" | "enum_item" | "union_item" => {
                let Some(name) = field_text(item, "name", content) else {
                    collector.push_opaque(item, parent);
                    continue;
                };
                let body = item.child_by_field_name("body");
                let mut draft =
                    UnitDraft::new(name, UnitKind::Class, signature_text(item, body, content));
                draft.doc = doc_comment(item, content);
                let scope = collector.push(item, draft, parent);
                types.insert(name.to_string(), scope);
            }
            "trait_item" => {
                let Some(name) = field_text(item, "name", content) else {
                    collector.push_opaque(item, parent);
                    continue;
                };
                let body = item.child_by_field_name("body");
                let mut draft =
                    UnitDraft::new(name, UnitKind::Class, signature_text(item, body, content));
                draft.doc = doc_comment(item, content);
                draft.supertypes = item
                    .child_by_field_name("bounds")
                    .map(|bounds| {
                        named_children(bounds)
                            .into_iter()
                            .map(|b| base_type_name(get_node_text(b, content)).to_string())
                            .filter(|b| !b.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                let scope = collector.push(item, draft, parent);
                if let Some(body) = body {
                    for member in named_children(body) {
                        if matches!(member.kind(), "function_item" | "function_signature_item") {
                            push_function(member, content, UnitKind::Method, Some(&scope), collector);
                        }
                    }
                }
                types.insert(name.to_string(), scope);
            }
            "mod_item" => {
                let Some(body) = item.child_by_field_name("body") else {
                    continue;
                };
                let Some(name) = field_text(item, "name", content) else {
                    collector.push_opaque(item, parent);
                    continue;
                };
                let mut draft =
                    UnitDraft::new(name, UnitKind::Module, signature_text(item, Some(body), content));
                draft.doc = doc_comment(item, content).or_else(|| inner_doc(body, content));
                let scope = collector.push(item, draft, parent);
                visit_items(body, content, Some(&scope), collector);
            }
            "impl_item" => impls.push(item),
            "ERROR" => {
                if looks_like_declaration(get_node_text(item, content)) {
                    collector.push_opaque(item, parent);
                } else {
                    collector.diagnostic(item, "syntax error");
                }
            }
            _ => {}
        }
    }

    // Impl blocks may precede the type they extend
    for item in impls {
        let type_name = field_text(item, "type", content).map(base_type_name);
        let owner = type_name.and_then(|t| types.get(t)).cloned();

        if let (Some(owner), Some(trait_name)) = (&owner, field_text(item, "trait", content)) {
            collector.add_supertype(owner, base_type_name(trait_name));
        }

        let Some(body) = item.child_by_field_name("body") else {
            continue;
        };
        let scope = owner.as_ref().or(parent);
        for member in named_children(body) {
            match member.kind() {
                "function_item" => {
                    push_function(member, content, UnitKind::Method, scope, collector);
                }
                "ERROR" if looks_like_declaration(get_node_text(member, content)) => {
                    collector.push_opaque(member, scope);
                }
                _ => {}
            }
        }
    }
}

fn push_function(
    item: tree_sitter::Node,
    content: &[u8],
    kind: UnitKind,
    parent: Option<&Scope>,
    collector: &mut UnitCollector,
) {
    let name = field_text(item, "name", content);
    let Some(name) = name.filter(|_| !item.has_error()) else {
        collector.push_opaque(item, parent);
        return;
    };

    let body = item.child_by_field_name("body");
    let mut draft = UnitDraft::new(name, kind, signature_text(item, body, content));
    draft.doc = doc_comment(item, content);
    draft.parameters = item
        .child_by_field_name("parameters")
        .map(|p| parse_parameters(p, content))
        .unwrap_or_default();
    draft.return_type = field_text(item, "return_type", content).map(str::to_string);
    collector.push(item, draft, parent);
}

fn parse_parameters(params: tree_sitter::Node, content: &[u8]) -> Vec<ParamDescriptor> {
    named_children(params)
        .into_iter()
        .filter(|p| p.kind() == "parameter")
        .filter_map(|p| {
            let pattern = field_text(p, "pattern", content)?;
            let name = pattern.strip_prefix("mut ").unwrap_or(pattern);
            let mut param = ParamDescriptor::new(name);
            if let Some(t) = field_text(p, "type", content) {
                param = param.typed(t);
            }
            Some(param)
        })
        .collect()
}

/// `///` and `/** */` comments directly above an item
fn doc_comment(node: tree_sitter::Node, content: &[u8]) -> Option<String> {
    let lines = leading_comments(node, content, |t| {
        (t.starts_with("///") && !t.starts_with("////")) || t.starts_with("/**")
    });
    clean_comment(&lines)
}

/// `//!` comments at the start of a file or module body
fn inner_doc(container: tree_sitter::Node, content: &[u8]) -> Option<String> {
    let lines: Vec<&str> = named_children(container)
        .into_iter()
        .take_while(|c| c.kind().contains("comment"))
        .map(|c| get_node_text(c, content))
        .filter(|t| t.starts_with("//!") || t.starts_with("/*!"))
        .collect();
    let lines: Vec<String> = lines
        .iter()
        .map(|l| l.replacen("/*!", "/**", 1))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    clean_comment(&refs)
}

fn preceding_attributes<'a>(node: tree_sitter::Node, content: &'a [u8]) -> Vec<&'a str> {
    let mut attributes = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(prev) = current {
        match prev.kind() {
            "attribute_item" => attributes.push(get_node_text(prev, content)),
            kind if kind.contains("comment") => {}
            _ => break,
        }
        current = prev.prev_sibling();
    }
    attributes
}

fn has_visibility(node: tree_sitter::Node) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|c| c.kind() == "visibility_modifier")
}

/// Trait members and trait impl members carry the trait's visibility
fn is_implicitly_public(node: tree_sitter::Node) -> bool {
    let Some(owner) = node.parent().and_then(|list| list.parent()) else {
        return false;
    };
    match owner.kind() {
        "trait_item" => true,
        "impl_item" => owner.child_by_field_name("trait").is_some(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> crate::types::SourceFile {
        RustAdapter::new().unwrap().parse(content, "src/lib.rs").unwrap()
    }

    #[test]
    fn test_top_level_units_in_order() {
        let file = parse(
            r#"//! Crate docs.

use std::fmt;

/// A point.
pub struct Point {
    x: i32,
}

impl Point {
    pub fn new(x: i32) -> Self {
        Self { x }
    }
}

pub enum Shape {
    Circle,
}

pub trait Area {
    fn area(&self) -> f64;
}

pub fn free(a: i32, mut b: String) -> usize {
    b.len() + a as usize
}

mod inner {
    pub fn helper() {}
}
"#,
        );
        let top: Vec<_> = file.top_level().map(|u| u.name.as_str()).collect();
        assert_eq!(top, vec!["Point", "Shape", "Area", "free", "inner"]);
        assert_eq!(file.module_doc.as_deref(), Some("Crate docs."));

        let point = file.units.iter().find(|u| u.name == "Point").unwrap();
        assert_eq!(point.doc.as_deref(), Some("A point."));

        let new = file.units.iter().find(|u| u.name == "new").unwrap();
        assert_eq!(new.id.as_str(), "src/lib.rs::Point.new");
        assert_eq!(new.kind, UnitKind::Method);
        assert!(new.has_signal(&Signal::Constructor));

        let area = file.units.iter().find(|u| u.name == "area").unwrap();
        assert_eq!(area.signature, "fn area(&self) -> f64");

        let helper = file.units.iter().find(|u| u.name == "helper").unwrap();
        assert_eq!(helper.kind, UnitKind::Function);
        assert_eq!(helper.qualified_name, "inner.helper");
    }

    #[test]
    fn test_parameters_skip_receiver() {
        let file = parse("struct S;\nimpl S {\n    fn run(&mut self, mut count: u32, name: &str) {}\n}\n");
        let run = file.units.iter().find(|u| u.name == "run").unwrap();
        let names: Vec<_> = run.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["count", "name"]);
        assert_eq!(run.parameters[1].declared_type.as_deref(), Some("&str"));
        assert!(run.has_signal(&Signal::Private));
    }

    #[test]
    fn test_impl_before_type_attaches_methods() {
        let file = parse("impl Config {\n    pub fn load() -> Self { Config }\n}\n\npub struct Config;\n");
        let load = file.units.iter().find(|u| u.name == "load").unwrap();
        let config = file.units.iter().find(|u| u.name == "Config").unwrap();
        assert_eq!(load.parent.as_ref(), Some(&config.id));
        assert_eq!(file.top_level().count(), 1);
    }

    #[test]
    fn test_trait_impl_adds_supertype() {
        let file = parse(
            "pub trait Shape {}\npub struct Square;\nimpl Shape for Square {}\nimpl fmt::Display for Square {\n    fn fmt(&self) {}\n}\n",
        );
        let square = file.units.iter().find(|u| u.name == "Square").unwrap();
        assert_eq!(square.supertypes, vec!["Shape", "Display"]);
        let fmt = file.units.iter().find(|u| u.name == "fmt").unwrap();
        assert!(!fmt.has_signal(&Signal::Private));
    }

    #[test]
    fn test_signals() {
        let file = parse(
            "#[test]\nfn checks() {}\n\n#[deprecated]\npub async fn old() {}\n",
        );
        assert!(file.units[0].has_signal(&Signal::Test));
        assert!(file.units[1].has_signal(&Signal::Async));
        assert!(file.units[1].has_signal(&Signal::Deprecated));
        assert!(!file.units[1].has_signal(&Signal::Private));
    }

    #[test]
    fn test_syntax_error_in_one_body() {
        let file = parse("fn ok_one() {}\n\nfn broken() -> i32 { 1 + }\n\nfn ok_two() {}\n");
        assert_eq!(file.top_level().count(), 3);

        let unparsed: Vec<_> = file.units.iter().filter(|u| u.is_unparsed()).collect();
        assert_eq!(unparsed.len(), 1);
        assert_eq!(unparsed[0].name, "broken");
        assert!(!file.diagnostics.is_empty());
        assert!(!file.is_total_failure());

        let names: Vec<_> = file.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["ok_one", "broken", "ok_two"]);
    }
}
