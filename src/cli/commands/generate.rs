//! Generate Command
//!
//! Documents every supported file under a path and writes the run
//! (fragments, failures, summary) as JSON.
//!
//! Usage:
//!   docloom generate [PATH] [-o docs.json] [--provider openai] [--model gpt-4]

use std::fs;
use std::path::{Path, PathBuf};

use tokio::runtime::Runtime;
use tracing::{info, warn};

use super::load_config;
use crate::ai::create_provider;
use crate::cli::ui::Output;
use crate::orchestrator::{ProjectOrchestrator, ProjectRun};
use crate::types::Result;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// File or directory to document
    pub path: PathBuf,
    /// Explicit config file (replaces global/project lookup)
    pub config: Option<PathBuf>,
    /// Where to write the run as JSON
    pub output: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_attempts: Option<u32>,
}

pub fn run(options: GenerateOptions) -> Result<()> {
    let mut config = load_config(options.config.as_deref())?;
    if let Some(provider) = options.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = options.model {
        config.llm.model = model;
    }
    if let Some(max_attempts) = options.max_attempts {
        config.generation.max_attempts = max_attempts;
    }

    let provider = create_provider(&config.llm)?;
    let orchestrator = ProjectOrchestrator::new(config, provider)?;

    let rt = Runtime::new()?;
    let run = rt.block_on(async {
        let cancel = orchestrator.cancellation();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight requests");
                cancel.cancel();
            }
        });
        orchestrator.generate_project(&options.path).await
    })?;

    let output = Output::new();
    if let Some(path) = &options.output {
        write_run(path, &run)?;
        output.success(&format!("Wrote {}", path.display()));
    }
    output.run(&run);
    Ok(())
}

fn write_run(path: &Path, run: &ProjectRun) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(run)?)?;
    info!(
        "Saved {} fragments (fingerprint {})",
        run.fragments.len(),
        run.fragments.fingerprint()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::ScriptedProvider;
    use crate::config::Config;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_run_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tool.py"), "def run(task):\n    return task\n").unwrap();

        let provider = Arc::new(ScriptedProvider::always(Ok(
            "Runs the given task and hands it back to the caller without any changes.".to_string(),
        )));
        let orchestrator = ProjectOrchestrator::new(Config::default(), provider).unwrap();
        let run = orchestrator.generate_project(dir.path()).await.unwrap();

        let target = dir.path().join("out/nested/docs.json");
        write_run(&target, &run).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert!(json["fragments"]["tool.py::run"]["text"].is_string());
        assert_eq!(json["summary"]["units_succeeded"], 1);
    }
}
