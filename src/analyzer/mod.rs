//! Code Analyzer Module
//!
//! Provides language-agnostic code analysis capabilities:
//! - Adapter selection by extension table and shebang sniffing
//! - Multi-language unit extraction (tree-sitter)
//! - Whole-file signal pass (call graph, design patterns)
//! - File scanning with gitignore support

pub mod parser;
pub mod scanner;
pub mod signals;

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use parser::{Language, SharedAdapter};

use crate::config::AnalysisConfig;
use crate::types::{DocError, Result, SourceFile};

/// Bytes read from an unmapped file when looking for a shebang
const SHEBANG_READ_LIMIT: u64 = 256;

/// Drives the language adapters.
///
/// Holds one adapter per language and never inspects an adapter beyond
/// selecting it from the extension and shebang tables.
pub struct CodeAnalyzer {
    adapters: HashMap<Language, SharedAdapter>,
    extensions: HashMap<String, Language>,
}

impl CodeAnalyzer {
    /// Analyzer with every built-in adapter and the configured extension table
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self::with_adapters(parser::default_adapters()?, config.extension_map()?))
    }

    pub fn with_adapters(adapters: Vec<SharedAdapter>, extensions: HashMap<String, Language>) -> Self {
        let adapters = adapters.into_iter().map(|a| (a.language(), a)).collect();
        Self { adapters, extensions }
    }

    pub fn has_adapters(&self) -> bool {
        !self.adapters.is_empty()
    }

    fn by_extension(&self, path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.extensions
            .get(&ext)
            .copied()
            .filter(|lang| self.adapters.contains_key(lang))
    }

    fn by_content(&self, content: &str) -> Option<Language> {
        let first_line = content.lines().next()?;
        Language::from_shebang(first_line).filter(|lang| self.adapters.contains_key(lang))
    }

    /// Language for `path`, sniffing the first line when the extension is unmapped
    pub fn detect(&self, path: &Path) -> Option<Language> {
        if let Some(lang) = self.by_extension(path) {
            return Some(lang);
        }
        let file = std::fs::File::open(path).ok()?;
        let mut first_line = String::new();
        BufReader::new(file.take(SHEBANG_READ_LIMIT))
            .read_line(&mut first_line)
            .ok()?;
        self.by_content(&first_line)
    }

    /// True when some adapter would handle `path`
    pub fn accepts(&self, path: &Path) -> bool {
        self.detect(path).is_some()
    }

    /// Analyze a file on disk, identified by its path as given
    pub fn analyze(&self, path: &Path) -> Result<SourceFile> {
        self.analyze_as(path, &path.to_string_lossy())
    }

    /// Analyze a file on disk under an explicit identity (e.g. a root-relative path)
    pub fn analyze_as(&self, path: &Path, label: &str) -> Result<SourceFile> {
        let content = std::fs::read_to_string(path)?;
        let language = self
            .by_extension(path)
            .or_else(|| self.by_content(&content))
            .ok_or_else(|| DocError::UnsupportedLanguage {
                path: label.to_string(),
            })?;
        self.parse_with(language, label, &content)
    }

    /// Analyze in-memory text; `label` supplies both the identity and the extension
    pub fn analyze_source(&self, label: &str, content: &str) -> Result<SourceFile> {
        let language = self
            .by_extension(Path::new(label))
            .or_else(|| self.by_content(content))
            .ok_or_else(|| DocError::UnsupportedLanguage {
                path: label.to_string(),
            })?;
        self.parse_with(language, label, content)
    }

    fn parse_with(&self, language: Language, label: &str, content: &str) -> Result<SourceFile> {
        let adapter = self
            .adapters
            .get(&language)
            .ok_or_else(|| DocError::UnsupportedLanguage {
                path: label.to_string(),
            })?;

        let mut file = adapter.parse(content, label)?;
        signals::enrich(&mut file);

        tracing::debug!(
            "Analyzed {} as {} ({} units, {} diagnostics)",
            label,
            language,
            file.units.len(),
            file.diagnostics.len()
        );
        Ok(file)
    }
}
