//! Sectioned prompt layout.
//!
//! Every template renders through the same structure so prompts stay
//! comparable across unit kinds and styles:
//!
//! 1. **Role**: who the model is for this request
//! 2. **Objectives**: numbered goals
//! 3. **Focus**: the unit being documented and what to avoid
//! 4. **Sections**: headed text and code blocks carrying the context

/// Prompt section types
#[derive(Debug, Clone)]
enum PromptSection {
    Role { expertise: String, task: String },
    Objectives(Vec<String>),
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
    /// Ordered key-value facts
    Facts(Vec<(String, String)>),
    Text {
        header: Option<String>,
        content: String,
    },
    Code { language: String, content: String },
}

/// Accumulates sections and renders them in insertion order
#[derive(Debug, Clone, Default)]
pub struct PromptSections {
    sections: Vec<PromptSection>,
}

impl PromptSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn objectives(mut self, objectives: &[&str]) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn focus(mut self, target: &str, restrictions: &[&str]) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Add a fact, extending the previous facts block when there is one
    pub fn fact(mut self, key: &str, value: &str) -> Self {
        if let Some(PromptSection::Facts(facts)) = self.sections.last_mut() {
            facts.push((key.to_string(), value.to_string()));
        } else {
            self.sections
                .push(PromptSection::Facts(vec![(key.to_string(), value.to_string())]));
        }
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn code(mut self, language: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Code {
            language: language.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("Document EXCLUSIVELY: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
                PromptSection::Facts(facts) => {
                    for (key, value) in facts {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Code { language, content } => {
                    prompt.push_str(&format!("```{}\n", language));
                    prompt.push_str(&content);
                    prompt.push_str("\n```\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_prompt() {
        let prompt = PromptSections::new()
            .role("technical writer", "API reference documentation")
            .objectives(&["Describe every parameter", "State the return value"])
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("technical writer"));
        assert!(prompt.contains("1. Describe every parameter"));
        assert!(prompt.contains("2. State the return value"));
    }

    #[test]
    fn test_facts_keep_insertion_order() {
        let prompt = PromptSections::new()
            .fact("Kind", "function")
            .fact("File", "src/math.py")
            .build();
        let kind = prompt.find("**Kind**").unwrap();
        let file = prompt.find("**File**").unwrap();
        assert!(kind < file);
    }

    #[test]
    fn test_focus_and_code() {
        let prompt = PromptSections::new()
            .focus("math.add", &["Do NOT speculate"])
            .section("Signature", "")
            .code("python", "def add(a, b):")
            .build();

        assert!(prompt.contains("Document EXCLUSIVELY: math.add"));
        assert!(prompt.contains("```python\ndef add(a, b):\n```"));
        assert!(!prompt.ends_with('\n'));
    }
}
