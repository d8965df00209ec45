//! Token Counting
//!
//! Provides token estimation for prompt budgeting.
//!
//! ## Strategy
//! - Count before sending, never after: the budget is enforced on the estimate
//! - The code-aware estimator is the default since prompts are mostly source text
//! - Estimates are deterministic so the same prompt always gets the same count

/// Token estimation method
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TokenEstimator {
    /// Simple character-based estimation (4 chars = 1 token)
    /// Good for general English text
    CharBased,
    /// Word-based estimation (0.75 tokens per word on average)
    WordBased,
    /// Code-aware estimation (accounts for syntax, keywords)
    #[default]
    CodeAware,
}

/// Token counter for context management
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter {
    estimator: TokenEstimator,
}

impl TokenCounter {
    pub fn new(estimator: TokenEstimator) -> Self {
        Self { estimator }
    }

    /// Estimate token count for a string
    pub fn count(&self, text: &str) -> usize {
        match self.estimator {
            TokenEstimator::CharBased => text.chars().count().div_ceil(4).max(1),
            TokenEstimator::WordBased => {
                let word_count = text.split_whitespace().count();
                (word_count as f32 * 0.75).ceil() as usize + 1
            }
            TokenEstimator::CodeAware => count_code_aware(text),
        }
    }

    /// Check if content fits within token budget
    pub fn fits_budget(&self, text: &str, budget: usize) -> bool {
        self.count(text) <= budget
    }

    /// Calculate remaining budget after content
    pub fn remaining_budget(&self, text: &str, budget: usize) -> usize {
        budget.saturating_sub(self.count(text))
    }
}

/// Punctuation and operators count as one token each; words are estimated
/// by length.
fn count_code_aware(text: &str) -> usize {
    let mut tokens = 0;
    let mut word_len = 0;

    for ch in text.chars() {
        match ch {
            '(' | ')' | '{' | '}' | '[' | ']' | ';' | ':' | ',' | '.' | '+' | '-' | '*' | '/'
            | '=' | '<' | '>' | '!' | '&' | '|' | '@' | '#' | '$' | '%' | '^' | '~' | '?'
            | '\\' => {
                tokens += word_tokens(word_len);
                word_len = 0;
                tokens += 1;
            }
            c if c.is_whitespace() => {
                tokens += word_tokens(word_len);
                word_len = 0;
            }
            c => word_len += c.len_utf8(),
        }
    }
    tokens += word_tokens(word_len);

    tokens.max(1)
}

/// Tokens for a word of `len` bytes
fn word_tokens(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => len.div_ceil(4),
    }
}
