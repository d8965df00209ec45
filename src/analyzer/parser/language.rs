//! Language Detection Module
//!
//! Single source of truth for the languages the analyzer understands.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docloom::analyzer::parser::Language;
//!
//! assert_eq!(Language::from_path("src/main.rs"), Some(Language::Rust));
//! assert_eq!(Language::from_shebang("#!/usr/bin/env python3"), Some(Language::Python));
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Language Metadata Table - Single Source of Truth
// =============================================================================

/// Language metadata entry containing all language-specific information
struct LanguageMeta {
    /// Display name (human-readable)
    display_name: &'static str,
    /// Syntax highlighting identifier (for markdown code blocks)
    highlight_str: &'static str,
    /// Default file extensions
    extensions: &'static [&'static str],
    /// Names accepted in configuration
    aliases: &'static [&'static str],
    /// Interpreter names recognized on a shebang line
    interpreters: &'static [&'static str],
}

/// Macro to define language metadata concisely
macro_rules! lang_meta {
    ($display:literal, $highlight:literal, [$($ext:literal),*], [$($alias:literal),*], [$($interp:literal),*]) => {
        LanguageMeta {
            display_name: $display,
            highlight_str: $highlight,
            extensions: &[$($ext),*],
            aliases: &[$($alias),*],
            interpreters: &[$($interp),*],
        }
    };
}

impl Language {
    fn meta(&self) -> LanguageMeta {
        match self {
            Language::Python => lang_meta!("Python", "python", ["py", "pyi"], ["python", "py"], ["python", "python3", "python2"]),
            Language::Rust => lang_meta!("Rust", "rust", ["rs"], ["rust", "rs"], []),
            Language::TypeScript => lang_meta!("TypeScript", "typescript", ["ts"], ["typescript", "ts"], ["ts-node"]),
            Language::Tsx => lang_meta!("TSX", "tsx", ["tsx"], ["tsx"], []),
            Language::JavaScript => lang_meta!("JavaScript", "javascript", ["js", "mjs", "cjs"], ["javascript", "js"], ["node", "deno", "bun"]),
            Language::Jsx => lang_meta!("JSX", "jsx", ["jsx"], ["jsx"], []),
            Language::Go => lang_meta!("Go", "go", ["go"], ["go", "golang"], []),
        }
    }
}

// =============================================================================
// Language Enum Definition
// =============================================================================

/// Languages with a registered adapter.
///
/// TypeScript, TSX, JavaScript and JSX share one adapter family and differ
/// only in the grammar dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    Python,
    Rust,
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    Go,
}

impl Language {
    /// Display name (human-readable)
    pub fn as_str(&self) -> &'static str {
        self.meta().display_name
    }

    /// Syntax highlighting identifier (lowercase, for markdown code blocks)
    pub fn highlight_str(&self) -> &'static str {
        self.meta().highlight_str
    }

    /// Built-in extensions for this language
    pub fn default_extensions(&self) -> &'static [&'static str] {
        self.meta().extensions
    }

    /// Detect language from a built-in file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext_lower = ext.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.meta().extensions.contains(&ext_lower.as_str()))
    }

    /// Detect language from file path using the built-in extension table
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect language from a `#!` first line
    pub fn from_shebang(first_line: &str) -> Option<Self> {
        let line = first_line.trim();
        let rest = line.strip_prefix("#!")?;
        let mut parts = rest.split_whitespace();
        let program = parts.next()?;
        let program = program.rsplit('/').next().unwrap_or(program);
        // `#!/usr/bin/env python3` names the interpreter in the second word
        let interpreter = if program == "env" {
            parts.find(|p| !p.starts_with('-'))?
        } else {
            program
        };

        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.meta().interpreters.contains(&interpreter))
    }

    /// All variants in table order
    pub fn all() -> &'static [Language] {
        &[
            Language::Python,
            Language::Rust,
            Language::TypeScript,
            Language::Tsx,
            Language::JavaScript,
            Language::Jsx,
            Language::Go,
        ]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s_lower = s.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.meta().aliases.contains(&s_lower.as_str()))
            .ok_or_else(|| format!("Unknown language: {}", s))
    }
}
