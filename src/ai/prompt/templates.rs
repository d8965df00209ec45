//! Prompt templates keyed by (unit kind, style).
//!
//! Pairs without a dedicated template use [`GENERIC`], so selection never
//! fails.

use crate::types::{DocStyle, UnitKind};

/// Static description of one prompt template
#[derive(Debug)]
pub struct Template {
    pub id: &'static str,
    pub expertise: &'static str,
    pub task: &'static str,
    pub objectives: &'static [&'static str],
    /// Output instructions; `None` uses the style default
    pub format: Option<&'static str>,
}

impl Template {
    pub fn format_for(&self, style: DocStyle) -> &'static str {
        self.format.unwrap_or_else(|| style_format(style))
    }
}

pub const FOCUS_RULES: &[&str] = &[
    "Do NOT restate the signature without explaining it",
    "Do NOT speculate about code you cannot see",
    "ONLY document facts observable in the provided code",
];

static MODULE_GUIDE: Template = Template {
    id: "module-guide",
    expertise: "technical writer",
    task: "usage guides for source modules",
    objectives: &[
        "Explain what this module is for and when to reach for it",
        "Walk through its main entry points in the order a reader would use them",
        "Show at least one realistic usage example",
    ],
    format: Some(
        "Write Markdown with an \"Overview\" section, a \"Usage\" section and an \"Example\" section containing a fenced code block.",
    ),
};

static CLASS_API_DOC: Template = Template {
    id: "class-api-doc",
    expertise: "API documentation writer",
    task: "reference documentation for types",
    objectives: &[
        "Summarize the responsibility of this type in one sentence",
        "Describe its construction and its most important methods",
        "Note invariants a caller must respect",
    ],
    format: Some(
        "Write Markdown starting with a one-sentence summary, followed by a \"Methods\" section listing each method with a short description.",
    ),
};

static CLASS_GUIDE: Template = Template {
    id: "class-guide",
    expertise: "technical writer",
    task: "usage guides for types",
    objectives: &[
        "Explain the problem this type solves",
        "Show how to construct it and use it end to end",
        "Call out common mistakes",
    ],
    format: Some(
        "Write Markdown with an \"Overview\" section, a \"Usage\" section and an \"Example\" section containing a fenced code block.",
    ),
};

static CALLABLE_API_DOC: Template = Template {
    id: "callable-api-doc",
    expertise: "API documentation writer",
    task: "reference documentation for functions",
    objectives: &[
        "Summarize what the function does in one sentence",
        "Describe every parameter by name",
        "Describe the return value",
        "List the error or exception conditions, if any",
    ],
    format: Some(
        "Write Markdown: a one-sentence summary, then a \"Parameters:\" list with one `- `name`: description` entry per parameter, then a sentence starting with \"Returns\", then a \"Raises:\" list only if the function can fail.",
    ),
};

static CALLABLE_INLINE_COMMENT: Template = Template {
    id: "callable-inline-comment",
    expertise: "senior engineer",
    task: "concise code comments",
    objectives: &[
        "Explain why the function exists, not only what it does",
        "Mention any non-obvious constraint on its inputs",
    ],
    format: Some(
        "Write one or two plain sentences suitable for a comment above the function. No Markdown headings, no code blocks.",
    ),
};

pub static GENERIC: Template = Template {
    id: "generic",
    expertise: "technical writer",
    task: "source code documentation",
    objectives: &[
        "Explain what this code element does",
        "Describe how it is meant to be used",
    ],
    format: None,
};

/// Default output instructions for a style
pub fn style_format(style: DocStyle) -> &'static str {
    match style {
        DocStyle::InlineComment => {
            "Write one or two plain sentences suitable for a code comment explaining why this element exists."
        }
        DocStyle::ApiDoc => {
            "Write Markdown reference documentation: a one-sentence summary followed by details on inputs and outputs."
        }
        DocStyle::Guide => {
            "Write a Markdown guide with an \"Overview\" section, a \"Usage\" section and an \"Example\" section containing a fenced code block."
        }
    }
}

pub fn select(kind: UnitKind, style: DocStyle) -> &'static Template {
    match (kind, style) {
        (UnitKind::Module, DocStyle::Guide) => &MODULE_GUIDE,
        (UnitKind::Class, DocStyle::ApiDoc) => &CLASS_API_DOC,
        (UnitKind::Class, DocStyle::Guide) => &CLASS_GUIDE,
        (UnitKind::Function | UnitKind::Method, DocStyle::ApiDoc) => &CALLABLE_API_DOC,
        (UnitKind::Function | UnitKind::Method, DocStyle::InlineComment) => {
            &CALLABLE_INLINE_COMMENT
        }
        _ => &GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedicated_templates() {
        assert_eq!(select(UnitKind::Function, DocStyle::ApiDoc).id, "callable-api-doc");
        assert_eq!(select(UnitKind::Method, DocStyle::ApiDoc).id, "callable-api-doc");
        assert_eq!(select(UnitKind::Module, DocStyle::Guide).id, "module-guide");
    }

    #[test]
    fn test_every_pair_selects_a_template() {
        let kinds = [UnitKind::Module, UnitKind::Class, UnitKind::Function, UnitKind::Method];
        let styles = [DocStyle::InlineComment, DocStyle::ApiDoc, DocStyle::Guide];
        for kind in kinds {
            for style in styles {
                let template = select(kind, style);
                assert!(!template.format_for(style).is_empty());
            }
        }
        assert_eq!(select(UnitKind::Module, DocStyle::InlineComment).id, "generic");
        assert_eq!(select(UnitKind::Class, DocStyle::InlineComment).id, "generic");
    }

    #[test]
    fn test_generic_uses_style_format() {
        assert_eq!(GENERIC.format_for(DocStyle::Guide), style_format(DocStyle::Guide));
    }
}
