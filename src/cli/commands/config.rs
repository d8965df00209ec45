//! Config Command
//!
//! Manage docloom configuration.
//!
//! Usage:
//!   docloom config show [-f json]
//!   docloom config path
//!   docloom config init [--force]

use std::fs;
use std::path::{Path, PathBuf};

use super::load_config;
use crate::config::{Config, ConfigLoader};
use crate::types::{DocError, Result};

/// Show the effective configuration (merged from all sources)
pub fn show(config: Option<&Path>, format: &str) -> Result<()> {
    let config = load_config(config)?;
    println!("{}", ConfigLoader::render(&config, format == "json")?);
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    match ConfigLoader::global_config_path() {
        Some(global) => println!("Global:  {}{}", global.display(), exists_marker(&global)),
        None => println!("Global:  (cannot determine config directory)"),
    }
    let project = ConfigLoader::project_config_path();
    println!("Project: {}{}", project.display(), exists_marker(&project));
    println!("Env:     DOCLOOM_<SECTION>__<KEY>");
    Ok(())
}

fn exists_marker(path: &Path) -> &'static str {
    if path.exists() { "" } else { " (not found)" }
}

/// Write the default configuration to the project config path
pub fn init(force: bool) -> Result<()> {
    let path = ConfigLoader::project_config_path();
    let written = write_default(&path, force)?;
    println!("✓ Initialized project configuration");
    println!("  Config: {}", written.display());
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        return Err(DocError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, ConfigLoader::render(&Config::default(), false)?)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_default_round_trips_through_loader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".docloom/config.toml");

        write_default(&path, false).unwrap();
        let loaded = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(loaded.generation.max_attempts, Config::default().generation.max_attempts);
        assert_eq!(loaded.llm.model, Config::default().llm.model);
    }

    #[test]
    fn test_write_default_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[llm]\nmodel = \"custom\"\n").unwrap();

        assert!(matches!(write_default(&path, false), Err(DocError::Config(_))));
        write_default(&path, true).unwrap();
        let loaded = ConfigLoader::load_from_file(&path).unwrap();
        assert_ne!(loaded.llm.model, "custom");
    }
}
