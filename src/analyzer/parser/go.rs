use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::traits::{
    Extraction, LanguageAdapter, Scope, SyntaxTree, UnitCollector, UnitDraft, base_type_name,
    clean_comment, field_text, get_node_text, leading_comments, looks_like_declaration,
    named_children, naming_signals, signature_text, tokenize_with,
};
use super::Language;
use crate::types::{ParamDescriptor, Result, Signal, SourceUnit, UnitKind};

pub struct GoAdapter;

impl GoAdapter {
    pub fn new() -> Result<Self> {
        // Validate that the language is available
        let _ = super::traits::create_ts_parser(tree_sitter_go::LANGUAGE, "Go")?;
        Ok(Self)
    }
}

impl LanguageAdapter for GoAdapter {
    fn language(&self) -> Language {
        Language::Go
    }

    fn tokenize(&self, content: &str) -> Result<SyntaxTree> {
        tokenize_with(tree_sitter_go::LANGUAGE, "Go", content)
    }

    fn extract_units(&self, tree: &SyntaxTree, path: &str) -> Extraction {
        let content = tree.bytes();
        let root = tree.root();
        let mut collector = UnitCollector::new(path, content);
        visit_source(root, content, &mut collector);

        let package_doc = named_children(root)
            .into_iter()
            .find(|n| n.kind() == "package_clause")
            .and_then(|pkg| doc_comment(pkg, content));
        collector.finish(package_doc)
    }

    fn extract_signals(&self, tree: &SyntaxTree, units: &mut [SourceUnit]) {
        for unit in units.iter_mut() {
            if unit.is_unparsed() {
                continue;
            }
            let Some(node) = tree.node_for_span(&unit.span) else {
                continue;
            };
            let mut signals = naming_signals(unit);
            let name = unit.name.as_str();

            if name.chars().next().is_some_and(|c| c.is_lowercase()) {
                signals.push(Signal::Private);
            }
            if unit.kind == UnitKind::Function {
                if unit.id.path().ends_with("_test.go")
                    && ["Test", "Benchmark", "Example", "Fuzz"]
                        .iter()
                        .any(|p| name.starts_with(p))
                {
                    signals.push(Signal::Test);
                }
                let after_new = name.strip_prefix("New");
                if after_new.is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_uppercase)) {
                    signals.push(Signal::Constructor);
                }
            }
            if unit.kind.is_callable()
                && node
                    .child_by_field_name("body")
                    .is_some_and(spawns_goroutine)
            {
                signals.push(Signal::Async);
            }

            unit.signals.extend(signals);
        }
    }
}

fn visit_source(root: tree_sitter::Node, content: &[u8], collector: &mut UnitCollector) {
    let mut types: HashMap<String, Scope> = HashMap::new();
    let mut interfaces: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut structs: Vec<String> = Vec::new();
    let mut methods = Vec::new();

    for item in named_children(root) {
        match item.kind() {
            "function_declaration" => push_function(item, content, UnitKind::Function, None, collector),
            "method_declaration" => methods.push(item),
            "type_declaration" => {
                let specs: Vec<_> = named_children(item)
                    .into_iter()
                    .filter(|s| s.kind() == "type_spec")
                    .collect();
                let single = specs.len() == 1;
                for spec in specs {
                    let Some(name) = field_text(spec, "name", content) else {
                        collector.push_opaque(spec, None);
                        continue;
                    };
                    let Some(ty) = spec.child_by_field_name("type") else {
                        continue;
                    };
                    if !matches!(ty.kind(), "struct_type" | "interface_type") {
                        continue;
                    }

                    let header = get_node_text(spec, content)
                        .lines()
                        .next()
                        .unwrap_or_default()
                        .trim_end_matches('{')
                        .trim_end();
                    let mut draft = UnitDraft::new(name, UnitKind::Class, format!("type {}", header));
                    let anchor = if single { item } else { spec };
                    draft.doc = doc_comment(anchor, content);
                    if ty.kind() == "struct_type" {
                        draft.supertypes = embedded_types(ty, content);
                    }
                    let scope = collector.push(spec, draft, None);

                    if ty.kind() == "interface_type" {
                        let mut method_set = BTreeSet::new();
                        for elem in named_children(ty) {
                            if matches!(elem.kind(), "method_elem" | "method_spec") {
                                if let Some(method) = field_text(elem, "name", content) {
                                    method_set.insert(method.to_string());
                                }
                                push_function(elem, content, UnitKind::Method, Some(&scope), collector);
                            }
                        }
                        interfaces.insert(name.to_string(), method_set);
                    } else {
                        structs.push(name.to_string());
                    }
                    types.insert(name.to_string(), scope);
                }
            }
            "ERROR" => {
                if looks_like_declaration(get_node_text(item, content)) {
                    collector.push_opaque(item, None);
                } else {
                    collector.diagnostic(item, "syntax error");
                }
            }
            _ => {}
        }
    }

    // Methods may be declared before their receiver type
    let mut method_sets: HashMap<String, BTreeSet<String>> = HashMap::new();
    for item in methods {
        let receiver = item
            .child_by_field_name("receiver")
            .and_then(|r| receiver_type(r, content));
        let owner = receiver.as_deref().and_then(|r| types.get(r));
        if let (Some(receiver), Some(name)) = (&receiver, field_text(item, "name", content)) {
            method_sets
                .entry(receiver.clone())
                .or_default()
                .insert(name.to_string());
        }
        push_function(item, content, UnitKind::Method, owner, collector);
    }

    // Interfaces are satisfied implicitly by method sets
    for (interface, required) in &interfaces {
        if required.is_empty() {
            continue;
        }
        for name in &structs {
            let satisfies = method_sets
                .get(name)
                .is_some_and(|have| required.is_subset(have));
            if let (true, Some(scope)) = (satisfies, types.get(name)) {
                collector.add_supertype(scope, interface);
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
    draft.return_type = field_text(item, "result", content).map(str::to_string);
    collector.push(item, draft, parent);
}

fn parse_parameters(params: tree_sitter::Node, content: &[u8]) -> Vec<ParamDescriptor> {
    let mut result = Vec::new();
    for decl in named_children(params) {
        if !matches!(decl.kind(), "parameter_declaration" | "variadic_parameter_declaration") {
            continue;
        }
        let declared_type = field_text(decl, "type", content).map(|t| {
            if decl.kind() == "variadic_parameter_declaration" {
                format!("...{}", t)
            } else {
                t.to_string()
            }
        });
        let mut cursor = decl.walk();
        for name in decl.children_by_field_name("name", &mut cursor) {
            let mut param = ParamDescriptor::new(get_node_text(name, content));
            if let Some(t) = &declared_type {
                param = param.typed(t.clone());
            }
            result.push(param);
        }
    }
    result
}

fn receiver_type(receiver: tree_sitter::Node, content: &[u8]) -> Option<String> {
    let decl = named_children(receiver)
        .into_iter()
        .find(|d| d.kind() == "parameter_declaration")?;
    let ty = field_text(decl, "type", content)?;
    Some(base_type_name(ty).to_string())
}

/// Anonymous fields of a struct (embedding)
fn embedded_types(struct_type: tree_sitter::Node, content: &[u8]) -> Vec<String> {
    let Some(fields) = named_children(struct_type)
        .into_iter()
        .find(|c| c.kind() == "field_declaration_list")
    else {
        return Vec::new();
    };
    named_children(fields)
        .into_iter()
        .filter(|f| f.kind() == "field_declaration" && f.child_by_field_name("name").is_none())
        .filter_map(|f| field_text(f, "type", content))
        .map(|t| base_type_name(t).to_string())
        .collect()
}

fn doc_comment(node: tree_sitter::Node, content: &[u8]) -> Option<String> {
    let lines = leading_comments(node, content, |t| t.starts_with("//") || t.starts_with("/*"));
    let lines: Vec<String> = lines.iter().map(|l| l.replacen("/*", "/**", 1)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    clean_comment(&refs)
}

fn spawns_goroutine(node: tree_sitter::Node) -> bool {
    if node.kind() == "go_statement" {
        return true;
    }
    if node.kind() == "func_literal" {
        return false;
    }
    named_children(node).into_iter().any(spawns_goroutine)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, content: &str) -> crate::types::SourceFile {
        GoAdapter::new().unwrap().parse(content, path).unwrap()
    }

    #[test]
    fn test_top_level_units_in_order() {
        let file = parse(
            "server/server.go",
            r#"// Package server serves things.
package server

import "net/http"

// Handler handles requests.
type Handler interface {
    Serve(path string) error
}

func (s *Server) Serve(path string) error {
    go s.log(path)
    return nil
}

// Server is an HTTP server.
type Server struct {
    Addr string
}

func NewServer(addr string, opts ...Option) *Server {
    return &Server{Addr: addr}
}

func (s *Server) log(path string) {}
"#,
        );
        let top: Vec<_> = file.top_level().map(|u| u.name.as_str()).collect();
        assert_eq!(top, vec!["Handler", "Server", "NewServer"]);
        assert_eq!(file.module_doc.as_deref(), Some("Package server serves things."));

        let server = file.units.iter().find(|u| u.name == "Server").unwrap();
        assert_eq!(server.signature, "type Server struct");
        assert_eq!(server.doc.as_deref(), Some("Server is an HTTP server."));
        assert_eq!(server.supertypes, vec!["Handler"]);

        let serve = file
            .units
            .iter()
            .find(|u| u.name == "Serve" && u.parent.as_ref() == Some(&server.id))
            .unwrap();
        assert_eq!(serve.qualified_name, "Server.Serve");
        assert!(serve.has_signal(&Signal::Async));

        let ctor = file.units.iter().find(|u| u.name == "NewServer").unwrap();
        assert!(ctor.has_signal(&Signal::Constructor));
        let names: Vec<_> = ctor.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["addr", "opts"]);
        assert_eq!(ctor.parameters[1].declared_type.as_deref(), Some("...Option"));
        assert_eq!(ctor.return_type.as_deref(), Some("*Server"));

        let log = file.units.iter().find(|u| u.name == "log").unwrap();
        assert!(log.has_signal(&Signal::Private));
    }

    #[test]
    fn test_grouped_parameters() {
        let file = parse("math.go", "package math\n\nfunc Add(a, b int) int {\n    return a + b\n}\n");
        let add = &file.units[0];
        let names: Vec<_> = add.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(add.parameters[0].declared_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_receiver_without_local_type() {
        let file = parse("ext.go", "package ext\n\nfunc (c Client) Do() {}\n");
        assert_eq!(file.units.len(), 1);
        assert!(file.units[0].parent.is_none());
        assert_eq!(file.units[0].kind, UnitKind::Method);
    }
}
