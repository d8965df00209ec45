use super::traits::{
    Extraction, LanguageAdapter, Scope, SyntaxTree, UnitCollector, UnitDraft, base_type_name,
    clean_comment, field_text, get_node_text, leading_comments, looks_like_declaration,
    named_children, naming_signals, signature_text, tokenize_with,
};
use super::Language;
use crate::types::{ParamDescriptor, Result, Signal, SourceUnit, UnitKind};

/// Adapter for the TypeScript family; JavaScript and JSX use the TSX grammar.
pub struct TypeScriptAdapter {
    language: Language,
}

impl TypeScriptAdapter {
    pub fn new(language: Language) -> Result<Self> {
        let adapter = Self { language };
        // Validate that the language is available
        let _ = adapter.tokenize("")?;
        Ok(adapter)
    }
}

impl LanguageAdapter for TypeScriptAdapter {
    fn language(&self) -> Language {
        self.language
    }

    fn tokenize(&self, content: &str) -> Result<SyntaxTree> {
        match self.language {
            Language::TypeScript => {
                tokenize_with(tree_sitter_typescript::LANGUAGE_TYPESCRIPT, "TypeScript", content)
            }
            _ => tokenize_with(tree_sitter_typescript::LANGUAGE_TSX, "TSX", content),
        }
    }

    fn extract_units(&self, tree: &SyntaxTree, path: &str) -> Extraction {
        let content = tree.bytes();
        let root = tree.root();
        let mut collector = UnitCollector::new(path, content);
        visit_statements(root, content, None, &mut collector);
        collector.finish(file_doc(root, content))
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
            let function = callable_node(node);

            if unit.kind.is_callable() {
                let mut cursor = function.walk();
                let tokens: Vec<&str> = function.children(&mut cursor).map(|c| c.kind()).collect();
                if tokens.contains(&"async") {
                    signals.push(Signal::Async);
                }
                if tokens.contains(&"*") || function.kind().starts_with("generator_function") {
                    signals.push(Signal::Generator);
                }
                let path = unit.id.path();
                if path.contains(".test.") || path.contains(".spec.") {
                    signals.push(Signal::Test);
                }
            }

            if unit.kind == UnitKind::Method && unit.name == "constructor" {
                signals.push(Signal::Constructor);
            }
            if is_private(node, unit, content) {
                signals.push(Signal::Private);
            }

            unit.signals.extend(signals);
        }
    }
}

fn visit_statements(
    container: tree_sitter::Node,
    content: &[u8],
    parent: Option<&Scope>,
    collector: &mut UnitCollector,
) {
    for child in named_children(container) {
        let decl = if child.kind() == "export_statement" {
            match child.child_by_field_name("declaration") {
                Some(decl) => decl,
                None => continue,
            }
        } else {
            child
        };

        match decl.kind() {
            "function_declaration" | "generator_function_declaration" => {
                push_function(decl, decl, content, UnitKind::Function, parent, collector);
            }
            "class_declaration" | "abstract_class_declaration" => {
                let Some(name) = field_text(decl, "name", content) else {
                    collector.push_opaque(decl, parent);
                    continue;
                };
                let body = decl.child_by_field_name("body");
                let mut draft =
                    UnitDraft::new(name, UnitKind::Class, signature_text(decl, body, content));
                draft.doc = jsdoc(decl, content);
                draft.supertypes = heritage(decl, content);
                let scope = collector.push(decl, draft, parent);
                if let Some(body) = body {
                    visit_members(body, content, &scope, collector);
                }
            }
            "interface_declaration" => {
                let Some(name) = field_text(decl, "name", content) else {
                    collector.push_opaque(decl, parent);
                    continue;
                };
                let body = decl.child_by_field_name("body");
                let mut draft =
                    UnitDraft::new(name, UnitKind::Class, signature_text(decl, body, content));
                draft.doc = jsdoc(decl, content);
                draft.supertypes = heritage(decl, content);
                let scope = collector.push(decl, draft, parent);
                if let Some(body) = body {
                    visit_members(body, content, &scope, collector);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let declarators: Vec<_> = named_children(decl)
                    .into_iter()
                    .filter(|d| d.kind() == "variable_declarator")
                    .collect();
                let single = declarators.len() == 1;
                for declarator in declarators {
                    let Some(value) = declarator.child_by_field_name("value") else {
                        continue;
                    };
                    if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
                        continue;
                    }
                    let span_node = if single { decl } else { declarator };
                    push_function(span_node, value, content, UnitKind::Function, parent, collector);
                }
            }
            "expression_statement" => {
                if let Some(module) = decl.named_child(0).filter(|n| n.kind() == "internal_module") {
                    push_namespace(module, content, parent, collector);
                }
            }
            "internal_module" | "module" => push_namespace(decl, content, parent, collector),
            "ERROR" => {
                if looks_like_declaration(get_node_text(decl, content)) {
                    collector.push_opaque(decl, parent);
                } else {
                    collector.diagnostic(decl, "syntax error");
                }
            }
            _ => {}
        }
    }
}

fn push_namespace(
    module: tree_sitter::Node,
    content: &[u8],
    parent: Option<&Scope>,
    collector: &mut UnitCollector,
) {
    let Some(name) = field_text(module, "name", content) else {
        collector.push_opaque(module, parent);
        return;
    };
    let body = module.child_by_field_name("body");
    let mut draft = UnitDraft::new(name, UnitKind::Module, signature_text(module, body, content));
    draft.doc = jsdoc(module, content);
    let scope = collector.push(module, draft, parent);
    if let Some(body) = body {
        visit_statements(body, content, Some(&scope), collector);
    }
}

fn visit_members(body: tree_sitter::Node, content: &[u8], owner: &Scope, collector: &mut UnitCollector) {
    for member in named_children(body) {
        match member.kind() {
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                push_function(member, member, content, UnitKind::Method, Some(owner), collector);
            }
            "ERROR" if looks_like_declaration(get_node_text(member, content)) => {
                collector.push_opaque(member, Some(owner));
            }
            _ => {}
        }
    }
}

/// `span_node` is the unit's extent; `function` carries parameters and body
fn push_function(
    span_node: tree_sitter::Node,
    function: tree_sitter::Node,
    content: &[u8],
    kind: UnitKind,
    parent: Option<&Scope>,
    collector: &mut UnitCollector,
) {
    let name = if span_node.kind() == "lexical_declaration" || span_node.kind() == "variable_declaration" {
        named_children(span_node)
            .into_iter()
            .find(|d| d.kind() == "variable_declarator")
            .and_then(|d| field_text(d, "name", content))
    } else {
        field_text(span_node, "name", content)
    };
    let Some(name) = name.filter(|_| !span_node.has_error()) else {
        collector.push_opaque(span_node, parent);
        return;
    };

    let body = function.child_by_field_name("body");
    let signature = signature_text(span_node, body, content);
    let signature = signature.trim_end().trim_end_matches("=>").trim_end().to_string();
    let mut draft = UnitDraft::new(name, kind, signature);
    draft.doc = jsdoc(span_node, content);
    draft.parameters = match function.child_by_field_name("parameters") {
        Some(params) => parse_parameters(params, content),
        // `x => x` has a bare parameter
        None => field_text(function, "parameter", content)
            .map(|p| vec![ParamDescriptor::new(p)])
            .unwrap_or_default(),
    };
    draft.return_type = field_text(function, "return_type", content).map(strip_annotation);
    collector.push(span_node, draft, parent);
}

fn parse_parameters(params: tree_sitter::Node, content: &[u8]) -> Vec<ParamDescriptor> {
    named_children(params)
        .into_iter()
        .filter_map(|p| {
            let mut param = match p.kind() {
                "required_parameter" | "optional_parameter" => {
                    ParamDescriptor::new(field_text(p, "pattern", content)?)
                }
                "identifier" => ParamDescriptor::new(get_node_text(p, content)),
                _ => return None,
            };
            if param.name == "this" {
                return None;
            }
            if let Some(t) = field_text(p, "type", content) {
                param = param.typed(strip_annotation(t));
            }
            if let Some(v) = field_text(p, "value", content) {
                param = param.with_default(v);
            }
            Some(param)
        })
        .collect()
}

fn strip_annotation(text: &str) -> String {
    text.trim_start_matches(':').trim().to_string()
}

/// `extends` and `implements` targets of a class or interface
fn heritage(decl: tree_sitter::Node, content: &[u8]) -> Vec<String> {
    let mut supertypes = Vec::new();
    for child in named_children(decl) {
        let clauses = match child.kind() {
            "class_heritage" => named_children(child),
            "extends_type_clause" => vec![child],
            _ => continue,
        };
        for clause in clauses {
            for target in named_children(clause) {
                if target.kind().contains("type_arguments") {
                    continue;
                }
                let name = base_type_name(get_node_text(target, content));
                if !name.is_empty() && !supertypes.iter().any(|s| s == name) {
                    supertypes.push(name.to_string());
                }
            }
        }
    }
    supertypes
}

/// JSDoc directly above a declaration or its `export` wrapper
fn jsdoc(node: tree_sitter::Node, content: &[u8]) -> Option<String> {
    let anchor = node
        .parent()
        .filter(|p| p.kind() == "export_statement")
        .unwrap_or(node);
    let lines = leading_comments(anchor, content, |t| t.starts_with("/**"));
    clean_comment(&lines)
}

fn file_doc(root: tree_sitter::Node, content: &[u8]) -> Option<String> {
    let first = root.named_child(0).filter(|n| n.kind() == "comment")?;
    let text = get_node_text(first, content);
    // A leading JSDoc directly attached to a declaration belongs to it
    let attached = first
        .next_named_sibling()
        .is_some_and(|n| n.start_position().row == first.end_position().row + 1);
    (text.starts_with("/**") && !attached)
        .then(|| clean_comment(&[text]))
        .flatten()
}

fn callable_node(node: tree_sitter::Node) -> tree_sitter::Node {
    let declarator = match node.kind() {
        "lexical_declaration" | "variable_declaration" => named_children(node)
            .into_iter()
            .find(|d| d.kind() == "variable_declarator"),
        "variable_declarator" => Some(node),
        _ => None,
    };
    declarator
        .and_then(|d| d.child_by_field_name("value"))
        .unwrap_or(node)
}

fn is_private(node: tree_sitter::Node, unit: &SourceUnit, content: &[u8]) -> bool {
    if unit.name.starts_with('#') {
        return true;
    }
    if unit.kind == UnitKind::Method {
        return named_children(node)
            .into_iter()
            .any(|c| c.kind() == "accessibility_modifier" && get_node_text(c, content) == "private");
    }
    // Top-level declarations are private unless exported
    unit.is_top_level() && node.parent().is_none_or(|p| p.kind() != "export_statement")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(language: Language, path: &str, content: &str) -> crate::types::SourceFile {
        TypeScriptAdapter::new(language).unwrap().parse(content, path).unwrap()
    }

    #[test]
    fn test_top_level_units_in_order() {
        let file = parse(
            Language::TypeScript,
            "src/shapes.ts",
            r#"import { x } from "./x";

/** Area of anything. */
export interface Shape {
    area(): number;
}

export class Circle implements Shape {
    constructor(private r: number) {}

    area(): number {
        return 3.14 * this.r * this.r;
    }
}

export const double = (n: number): number => n * 2;

function helper(a: string, b = 1) {}

namespace Geometry {
    export function origin() {}
}
"#,
        );
        let top: Vec<_> = file.top_level().map(|u| u.name.as_str()).collect();
        assert_eq!(top, vec!["Shape", "Circle", "double", "helper", "Geometry"]);

        let shape = file.units.iter().find(|u| u.name == "Shape").unwrap();
        assert_eq!(shape.doc.as_deref(), Some("Area of anything."));

        let circle = file.units.iter().find(|u| u.name == "Circle").unwrap();
        assert_eq!(circle.supertypes, vec!["Shape"]);
        assert_eq!(file.children(&circle.id).count(), 2);

        let ctor = file.units.iter().find(|u| u.name == "constructor").unwrap();
        assert!(ctor.has_signal(&Signal::Constructor));

        let double = file.units.iter().find(|u| u.name == "double").unwrap();
        assert_eq!(double.parameters[0].declared_type.as_deref(), Some("number"));
        assert_eq!(double.return_type.as_deref(), Some("number"));
        assert!(!double.has_signal(&Signal::Private));

        let helper = file.units.iter().find(|u| u.name == "helper").unwrap();
        assert_eq!(helper.parameters[1].default_value.as_deref(), Some("1"));
        assert!(helper.has_signal(&Signal::Private));

        let origin = file.units.iter().find(|u| u.name == "origin").unwrap();
        assert_eq!(origin.qualified_name, "Geometry.origin");
    }

    #[test]
    fn test_javascript_dialect() {
        let file = parse(
            Language::JavaScript,
            "lib/index.js",
            "async function load(url) {}\n\nfunction* ids() { yield 1; }\n\nclass Store extends Base {}\n",
        );
        let top: Vec<_> = file.top_level().map(|u| u.name.as_str()).collect();
        assert_eq!(top, vec!["load", "ids", "Store"]);
        assert_eq!(file.language, Language::JavaScript);
        assert!(file.units[0].has_signal(&Signal::Async));
        assert!(file.units[1].has_signal(&Signal::Generator));
        assert_eq!(file.units[2].supertypes, vec!["Base"]);
    }

    #[test]
    fn test_tsx_dialect() {
        let file = parse(
            Language::Tsx,
            "ui/App.tsx",
            "export function App() {\n    return <div>hello</div>;\n}\n",
        );
        assert_eq!(file.top_level().count(), 1);
        assert!(!file.units[0].is_unparsed());
    }

    #[test]
    fn test_malformed_method_keeps_its_name() {
        let file = parse(
            Language::TypeScript,
            "src/a.ts",
            "class A {\n    m() { return 1 + ; }\n}\n",
        );
        let broken = file.units.iter().find(|u| u.is_unparsed()).unwrap();
        assert_eq!(broken.kind, UnitKind::Method);
        assert_eq!(broken.id.as_str(), "src/a.ts::A.m");
        assert!(!file.diagnostics.is_empty());
    }
}
