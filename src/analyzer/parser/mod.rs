//! Language Adapter Module
//!
//! Tree-sitter based adapters that normalize source files into
//! [`SourceFile`](crate::types::SourceFile) units.
//!
//! ## Adapter Factory
//!
//! Use `create_adapter` to create an adapter for a given language:
//!
//! ```rust,ignore
//! use docloom::analyzer::parser::{Language, create_adapter};
//!
//! let adapter = create_adapter(Language::Rust)?;
//! let file = adapter.parse(content, "src/main.rs")?;
//! ```

pub mod go;
pub mod language;
pub mod python;
pub mod rust_lang;
pub mod traits;
pub mod typescript;

pub use go::GoAdapter;
pub use language::Language;
pub use python::PythonAdapter;
pub use rust_lang::RustAdapter;
pub use traits::{
    Extraction, LanguageAdapter, SyntaxTree, create_ts_parser, get_node_text,
};
pub use typescript::TypeScriptAdapter;

use crate::types::Result;
use std::sync::Arc;

/// Shared adapter for thread-safe access
pub type SharedAdapter = Arc<dyn LanguageAdapter>;

/// Create an adapter for the given language.
///
/// # Supported Languages
///
/// - Python
/// - Rust
/// - TypeScript, TSX, JavaScript, JSX
/// - Go
pub fn create_adapter(language: Language) -> Result<SharedAdapter> {
    match language {
        Language::Python => Ok(Arc::new(PythonAdapter::new()?)),
        Language::Rust => Ok(Arc::new(RustAdapter::new()?)),
        Language::TypeScript | Language::Tsx | Language::JavaScript | Language::Jsx => {
            Ok(Arc::new(TypeScriptAdapter::new(language)?))
        }
        Language::Go => Ok(Arc::new(GoAdapter::new()?)),
    }
}

/// Adapters for every built-in language
pub fn default_adapters() -> Result<Vec<SharedAdapter>> {
    Language::all().iter().copied().map(create_adapter).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_adapter() {
        for language in Language::all() {
            let adapter = create_adapter(*language).unwrap();
            assert_eq!(adapter.language(), *language);
        }
    }

    #[test]
    fn test_default_adapters_cover_all_languages() {
        assert_eq!(default_adapters().unwrap().len(), Language::all().len());
    }
}
