//! Response Validation
//!
//! Checks a raw completion before it is accepted as a fragment:
//! - Non-empty after trimming
//! - Not an echo of the prompt or a bare restatement of the signature
//! - Length within the configured bounds for the style
//!
//! A wrapping code fence (```` ```markdown ... ``` ````) around the whole
//! answer is removed first; fences inside the answer are kept.

use std::fmt;

use crate::ai::prompt::Prompt;
use crate::config::LengthBounds;

/// Why a completion was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    EchoesPrompt,
    RestatesSignature,
    TooShort { len: usize, min: usize },
    TooLong { len: usize, max: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => write!(f, "empty response"),
            Rejection::EchoesPrompt => write!(f, "response echoes the prompt"),
            Rejection::RestatesSignature => write!(f, "response only restates the signature"),
            Rejection::TooShort { len, min } => {
                write!(f, "response too short ({} chars, minimum {})", len, min)
            }
            Rejection::TooLong { len, max } => {
                write!(f, "response too long ({} chars, maximum {})", len, max)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    bounds: LengthBounds,
}

impl ResponseValidator {
    pub fn new(bounds: LengthBounds) -> Self {
        Self { bounds }
    }

    /// Cleaned text on acceptance
    pub fn validate(&self, raw: &str, prompt: &Prompt) -> Result<String, Rejection> {
        let text = strip_wrapping_fence(raw.trim()).trim();
        if text.is_empty() {
            return Err(Rejection::Empty);
        }

        // Whole prompt inside the answer, or a large verbatim slice of it
        let normalized = normalize(text);
        let prompt_text = normalize(&prompt.text);
        if normalized.contains(&prompt_text)
            || (prompt_text.contains(&normalized) && normalized.len() * 2 >= prompt_text.len())
        {
            return Err(Rejection::EchoesPrompt);
        }

        let signature = normalize(&prompt.signature);
        if !signature.is_empty() {
            let remainder = normalize(&without_fence_lines(text)).replace(&signature, "");
            if !remainder.chars().any(char::is_alphanumeric) {
                return Err(Rejection::RestatesSignature);
            }
        }

        let bounds = self.bounds.for_style(prompt.style);
        let len = text.chars().count();
        if len < bounds.min {
            return Err(Rejection::TooShort {
                len,
                min: bounds.min,
            });
        }
        if len > bounds.max {
            return Err(Rejection::TooLong {
                len,
                max: bounds.max,
            });
        }

        Ok(text.to_string())
    }
}

/// Collapse whitespace runs so formatting differences do not hide an echo
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn without_fence_lines(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove a single fence wrapping the entire answer
fn strip_wrapping_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some((info, body)) = rest.split_once('\n') else {
        return text;
    };
    if !matches!(info.trim(), "" | "markdown" | "md" | "text") {
        return text;
    }
    let Some(inner) = body.trim_end().strip_suffix("```") else {
        return text;
    };
    // An inner fence means the outer one is not a wrapper
    if inner.contains("```") {
        return text;
    }
    inner
}
