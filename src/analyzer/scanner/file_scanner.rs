use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::constants::analysis::{DEFAULT_SKIP_DIRS, MAX_FILE_SIZE};
use crate::types::Result;

/// Enumerates candidate files under a project root.
///
/// Honors `.gitignore`, never follows symlinks, prunes well-known build and
/// dependency directories, and applies include/exclude globs to paths
/// relative to the root.
pub struct FileScanner {
    root: PathBuf,
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
    max_file_size: u64,
}

impl FileScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_size: MAX_FILE_SIZE,
        }
    }

    pub fn with_include(mut self, patterns: &[String]) -> Self {
        self.include = compile(patterns);
        self
    }

    pub fn with_exclude(mut self, patterns: &[String]) -> Self {
        self.exclude = compile(patterns);
        self
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false) // Security: prevent symlink traversal attacks
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && entry.depth() > 0 && is_skipped_dir(entry.file_name().to_str()))
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let relative = relative_path(&self.root, path);
            if !self.is_included(&relative) || self.is_excluded(&relative) {
                continue;
            }

            let Ok(metadata) = path.metadata() else {
                continue;
            };
            if metadata.len() > self.max_file_size {
                tracing::debug!("Skipping {} ({} bytes)", relative, metadata.len());
                continue;
            }

            files.push(ScannedFile {
                path: path.to_path_buf(),
                relative,
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }

    fn is_included(&self, relative: &str) -> bool {
        self.include.is_empty() || self.include.iter().any(|p| p.matches(relative))
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(relative))
    }
}

fn compile(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!("Ignoring invalid glob '{}': {}", p, e);
                None
            }
        })
        .collect()
}

fn is_skipped_dir(name: Option<&str>) -> bool {
    name.is_some_and(|n| DEFAULT_SKIP_DIRS.contains(&n))
}

/// Root-relative path with `/` separators, used as the file's identity
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub relative: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/nested/util.py"), "def f(): pass").unwrap();
        fs::write(root.join("src/notes.txt"), "notes").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join("target/debug/gen.rs"), "x").unwrap();
        dir
    }

    #[test]
    fn test_scan_skips_default_dirs() {
        let dir = fixture();
        let files = FileScanner::new(dir.path()).scan().unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(paths, vec!["src/main.rs", "src/nested/util.py", "src/notes.txt"]);
    }

    #[test]
    fn test_include_and_exclude_globs() {
        let dir = fixture();
        let files = FileScanner::new(dir.path())
            .with_include(&["src/**/*.rs".to_string(), "src/**/*.py".to_string()])
            .with_exclude(&["src/nested/**".to_string()])
            .scan()
            .unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(paths, vec!["src/main.rs"]);
    }

    #[test]
    fn test_max_file_size() {
        let dir = fixture();
        fs::write(dir.path().join("src/big.rs"), "x".repeat(64)).unwrap();
        let files = FileScanner::new(dir.path())
            .with_max_file_size(32)
            .scan()
            .unwrap();
        assert!(files.iter().all(|f| f.relative != "src/big.rs"));
        assert!(files.iter().any(|f| f.relative == "src/main.rs"));
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/project");
        assert_eq!(relative_path(root, Path::new("/project/a/b.rs")), "a/b.rs");
    }
}
