//! Prompt Builder
//!
//! Turns one [`SourceUnit`] plus its surrounding context into a bounded
//! prompt.
//!
//! ## Context priority
//!
//! The unit's signature is part of the frame and is never removed. Context
//! items are ranked, highest first:
//!
//! 1. **Docstring**: the existing doc comment
//! 2. **Body**: the unit's own source after the signature (shrunk by halving before it is dropped)
//! 3. **Siblings**: signatures of units sharing the parent, earlier first
//! 4. **Parent summary**: the enclosing declaration
//! 5. **Signals**: detected modifiers and patterns
//!
//! While the estimate exceeds the budget, items are removed from the
//! lowest-ranked end; equal ranks drop the later lexical item first.

mod sections;
pub mod templates;

pub use sections::PromptSections;
pub use templates::{Template, select as select_template};

use serde::Serialize;
use tracing::{debug, warn};

use crate::ai::tokenizer::TokenCounter;
use crate::constants::prompt::MAX_SIBLINGS;
use crate::types::{DocStyle, SourceFile, SourceUnit, UnitId};

// =============================================================================
// Prompt
// =============================================================================

/// Context item categories, ordered by priority (highest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextKind {
    Docstring,
    Body,
    Sibling,
    ParentSummary,
    Signals,
}

/// Rendered prompt for one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub unit_id: UnitId,
    pub template_id: &'static str,
    pub text: String,
    /// The unit's own signature, always present in `text`
    pub signature: String,
    pub estimated_tokens: usize,
    pub style: DocStyle,
    /// Context was shrunk or dropped to fit the budget
    pub truncated: bool,
    /// Items removed entirely, in removal order
    pub dropped: Vec<ContextKind>,
    /// Even the minimal frame did not fit; the signature was kept anyway
    pub over_budget: bool,
}

#[derive(Debug, Clone)]
struct ContextItem {
    kind: ContextKind,
    /// Lexical position among items of the same kind
    order: usize,
    content: String,
}

// =============================================================================
// Builder
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    counter: TokenCounter,
}

impl PromptBuilder {
    pub fn new(counter: TokenCounter) -> Self {
        Self { counter }
    }

    /// Build a prompt for `unit` whose estimate never exceeds `budget`
    /// unless the bare signature frame alone is larger.
    pub fn build(&self, file: &SourceFile, unit: &SourceUnit, style: DocStyle, budget: usize) -> Prompt {
        let template = templates::select(unit.kind, style);
        let fence = file.language.highlight_str();

        let mut items = collect_context(file, unit);
        items.sort_by_key(|item| (item.kind, item.order));

        let mut truncated = false;
        let mut dropped = Vec::new();

        loop {
            let text = render(template, file, unit, style, fence, &items);
            let tokens = self.counter.count(&text);
            if tokens <= budget {
                return self.finish(unit, template, style, text, tokens, truncated, dropped, false);
            }

            let Some(last) = items.last_mut() else {
                break;
            };
            truncated = true;
            if last.kind == ContextKind::Body
                && let Some(shrunk) = halve(&last.content)
            {
                last.content = shrunk;
                continue;
            }
            if let Some(item) = items.pop() {
                debug!("Dropping {:?} context for {}", item.kind, unit.id);
                dropped.push(item.kind);
            }
        }

        let text = render_minimal(template, unit, style, fence);
        let tokens = self.counter.count(&text);
        let over_budget = tokens > budget;
        if over_budget {
            warn!(
                "Signature of {} needs {} tokens, over the budget of {}; sending it anyway",
                unit.id, tokens, budget
            );
        }
        self.finish(unit, template, style, text, tokens, true, dropped, over_budget)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        unit: &SourceUnit,
        template: &'static Template,
        style: DocStyle,
        text: String,
        estimated_tokens: usize,
        truncated: bool,
        dropped: Vec<ContextKind>,
        over_budget: bool,
    ) -> Prompt {
        Prompt {
            unit_id: unit.id.clone(),
            template_id: template.id,
            text,
            signature: unit.signature.clone(),
            estimated_tokens,
            style,
            truncated,
            dropped,
            over_budget,
        }
    }
}

fn collect_context(file: &SourceFile, unit: &SourceUnit) -> Vec<ContextItem> {
    let mut items = Vec::new();

    if let Some(doc) = unit.doc.as_deref().filter(|d| !d.trim().is_empty()) {
        items.push(ContextItem {
            kind: ContextKind::Docstring,
            order: 0,
            content: doc.trim().to_string(),
        });
    }

    let body = unit.body().trim();
    if !body.is_empty() {
        items.push(ContextItem {
            kind: ContextKind::Body,
            order: 0,
            content: body.to_string(),
        });
    }

    for (order, sibling) in file.siblings(unit).take(MAX_SIBLINGS).enumerate() {
        items.push(ContextItem {
            kind: ContextKind::Sibling,
            order,
            content: format!("- {} `{}`", sibling.kind, sibling.signature),
        });
    }

    if let Some(parent) = file.parent_of(unit) {
        let mut summary = format!("{} `{}`", parent.kind, parent.signature);
        if let Some(first) = parent
            .doc
            .as_deref()
            .and_then(|d| d.lines().find(|l| !l.trim().is_empty()))
        {
            summary.push_str(&format!(": {}", first.trim()));
        }
        items.push(ContextItem {
            kind: ContextKind::ParentSummary,
            order: 0,
            content: summary,
        });
    }

    let signals: Vec<String> = unit.signals.iter().map(|s| s.to_string()).collect();
    if !signals.is_empty() {
        items.push(ContextItem {
            kind: ContextKind::Signals,
            order: 0,
            content: signals.join(", "),
        });
    }

    items
}

fn header(template: &Template, unit: &SourceUnit) -> PromptSections {
    PromptSections::new()
        .role(template.expertise, template.task)
        .objectives(template.objectives)
        .focus(&unit.qualified_name, templates::FOCUS_RULES)
}

fn render(
    template: &Template,
    file: &SourceFile,
    unit: &SourceUnit,
    style: DocStyle,
    fence: &str,
    items: &[ContextItem],
) -> String {
    let mut prompt = header(template, unit)
        .fact("Kind", unit.kind.as_str())
        .fact("File", &file.path)
        .fact("Language", file.language.as_str())
        .section("Signature", "")
        .code(fence, &unit.signature);

    for item in items.iter().filter(|i| i.kind == ContextKind::Docstring) {
        prompt = prompt.section("Existing Documentation", &item.content);
    }
    for item in items.iter().filter(|i| i.kind == ContextKind::Body) {
        prompt = prompt.section("Source", "").code(fence, &item.content);
    }
    let siblings: Vec<&str> = items
        .iter()
        .filter(|i| i.kind == ContextKind::Sibling)
        .map(|i| i.content.as_str())
        .collect();
    if !siblings.is_empty() {
        prompt = prompt.section("Neighboring Declarations", &siblings.join("\n"));
    }
    for item in items.iter().filter(|i| i.kind == ContextKind::ParentSummary) {
        prompt = prompt.section("Enclosing Declaration", &item.content);
    }
    for item in items.iter().filter(|i| i.kind == ContextKind::Signals) {
        prompt = prompt.section("Detected Signals", &item.content);
    }

    prompt
        .section("Output Format", template.format_for(style))
        .build()
}

/// Signature and output instructions only
fn render_minimal(template: &Template, unit: &SourceUnit, style: DocStyle, fence: &str) -> String {
    PromptSections::new()
        .text(&format!("Document this {} for {}.", unit.kind, template.task))
        .code(fence, &unit.signature)
        .text(template.format_for(style))
        .build()
}

/// First half of the lines plus an elision marker; `None` once a single line is left
fn halve(content: &str) -> Option<String> {
    let lines: Vec<&str> = content
        .lines()
        .filter(|l| l.trim() != "...")
        .collect();
    if lines.len() < 2 {
        return None;
    }
    let keep = lines.len() / 2;
    let mut shrunk = lines[..keep].join("\n");
    shrunk.push_str("\n...");
    Some(shrunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::CodeAnalyzer;
    use crate::config::AnalysisConfig;
    use proptest::prelude::*;

    const SOURCE: &str = r#"class Registry:
    """Keeps track of plugins."""

    def register(self, name, plugin):
        """Register a plugin under a name."""
        self.items[name] = plugin
        return plugin

    def lookup(self, name):
        return self.items[name]

    def clear(self):
        self.items = {}
"#;

    fn analyze(source: &str) -> SourceFile {
        CodeAnalyzer::new(&AnalysisConfig::default())
            .unwrap()
            .analyze_source("plugins.py", source)
            .unwrap()
    }

    fn unit<'a>(file: &'a SourceFile, name: &str) -> &'a SourceUnit {
        file.units.iter().find(|u| u.name == name).unwrap()
    }

    #[test]
    fn test_full_prompt_contains_all_context() {
        let file = analyze(SOURCE);
        let register = unit(&file, "register");
        let prompt = PromptBuilder::default().build(&file, register, DocStyle::ApiDoc, 10_000);

        assert_eq!(prompt.template_id, "callable-api-doc");
        assert!(!prompt.truncated);
        assert!(prompt.text.contains(&register.signature));
        assert!(prompt.text.contains("Register a plugin under a name."));
        assert!(prompt.text.contains("def lookup(self, name)"));
        assert!(prompt.text.contains("Keeps track of plugins."));
        assert_eq!(prompt.estimated_tokens, TokenCounter::default().count(&prompt.text));
    }

    #[test]
    fn test_signals_dropped_first() {
        let file = analyze(SOURCE);
        let register = unit(&file, "register");
        let builder = PromptBuilder::default();
        let full = builder.build(&file, register, DocStyle::ApiDoc, 10_000);
        assert!(register.signals.is_empty() || full.text.contains("Detected Signals"));

        let prompt = builder.build(&file, register, DocStyle::ApiDoc, full.estimated_tokens - 1);
        assert!(prompt.truncated);
        assert_eq!(prompt.dropped.first(), Some(&if register.signals.is_empty() {
            ContextKind::ParentSummary
        } else {
            ContextKind::Signals
        }));
        assert!(prompt.text.contains(&register.signature));
    }

    #[test]
    fn test_drop_order_follows_priority() {
        let file = analyze(SOURCE);
        let register = unit(&file, "register");
        let prompt = PromptBuilder::default().build(&file, register, DocStyle::ApiDoc, 0);

        assert!(prompt.over_budget);
        assert!(prompt.text.contains(&register.signature));
        // Removal order runs from the lowest priority to the highest
        assert!(prompt.dropped.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(prompt.dropped.last(), Some(&ContextKind::Docstring));
        assert_eq!(
            prompt.dropped.iter().filter(|k| **k == ContextKind::Sibling).count(),
            2
        );
    }

    #[test]
    fn test_later_sibling_dropped_before_earlier() {
        let file = analyze(SOURCE);
        let register = unit(&file, "register");
        let builder = PromptBuilder::default();

        // Find a budget where exactly one sibling survives
        let full = builder.build(&file, register, DocStyle::ApiDoc, 10_000);
        let mut kept_one = None;
        for budget in (0..full.estimated_tokens).rev() {
            let prompt = builder.build(&file, register, DocStyle::ApiDoc, budget);
            let siblings_dropped = prompt
                .dropped
                .iter()
                .filter(|k| **k == ContextKind::Sibling)
                .count();
            if siblings_dropped == 1 {
                kept_one = Some(prompt);
                break;
            }
        }
        let prompt = kept_one.unwrap();
        assert!(prompt.text.contains("def lookup(self, name)"));
        assert!(!prompt.text.contains("def clear(self)"));
    }

    #[test]
    fn test_body_halved_before_drop() {
        let body: String = (0..40).map(|i| format!("    x{} = {}\n", i, i)).collect();
        let source = format!("def big():\n{}", body);
        let file = analyze(&source);
        let big = unit(&file, "big");
        let builder = PromptBuilder::default();
        let full = builder.build(&file, big, DocStyle::ApiDoc, 10_000);

        let prompt = builder.build(&file, big, DocStyle::ApiDoc, full.estimated_tokens - 20);
        assert!(prompt.truncated);
        assert!(prompt.dropped.is_empty());
        assert!(prompt.text.contains("x0 = 0"));
        assert!(!prompt.text.contains("x39 = 39"));
        assert!(prompt.text.contains("..."));
    }

    #[test]
    fn test_docstring_outlives_long_body() {
        let body: String = (0..200).map(|i| format!("    let x{} = {};\n", i, i)).collect();
        let source = format!("/// Sums a long run of values.\nfn big(a: i32) -> i32 {{\n{}    a\n}}\n", body);
        let file = CodeAnalyzer::new(&AnalysisConfig::default())
            .unwrap()
            .analyze_source("big.rs", &source)
            .unwrap();
        let big = unit(&file, "big");
        assert_eq!(big.doc.as_deref(), Some("Sums a long run of values."));

        let builder = PromptBuilder::default();
        let full = builder.build(&file, big, DocStyle::ApiDoc, 10_000);
        let prompt = builder.build(&file, big, DocStyle::ApiDoc, full.estimated_tokens - 10);

        assert!(prompt.truncated);
        assert!(!prompt.dropped.contains(&ContextKind::Docstring));
        assert!(prompt.text.contains("Sums a long run of values."));
        assert!(prompt.text.contains("let x0 = 0;"));
        assert!(!prompt.text.contains("let x199 = 199;"));
    }

    #[test]
    fn test_unknown_pair_uses_generic_template() {
        let file = analyze(SOURCE);
        let registry = unit(&file, "Registry");
        let prompt = PromptBuilder::default().build(&file, registry, DocStyle::InlineComment, 10_000);
        assert_eq!(prompt.template_id, "generic");
    }

    proptest! {
        #[test]
        fn prop_budget_respected_and_signature_kept(
            lines in proptest::collection::vec("v_[a-z]{1,10} = [0-9]{1,6}", 1..60),
            doc in "[A-Za-z ,.]{0,200}",
            budget in 0usize..1500,
        ) {
            let body: String = lines.iter().map(|l| format!("    {}\n", l)).collect();
            let source = format!(
                "def helper():\n    pass\n\ndef target(a, b):\n    \"\"\"{}\"\"\"\n{}\ndef other():\n    pass\n",
                doc.replace('"', ""), body
            );
            let file = analyze(&source);
            let target = unit(&file, "target");
            let builder = PromptBuilder::default();
            let prompt = builder.build(&file, target, DocStyle::ApiDoc, budget);

            prop_assert!(prompt.text.contains(&target.signature));
            prop_assert_eq!(prompt.estimated_tokens, TokenCounter::default().count(&prompt.text));
            if prompt.over_budget {
                let minimal = builder.build(&file, target, DocStyle::ApiDoc, 0);
                prop_assert!(budget < minimal.estimated_tokens);
            } else {
                prop_assert!(prompt.estimated_tokens <= budget);
            }
        }
    }
}
