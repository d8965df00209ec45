use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docloom::cli::commands::{config, evaluate, generate};

#[derive(Parser)]
#[command(name = "docloom")]
#[command(version, about = "LLM-driven documentation generator for source code")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the global/project lookup
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate documentation for a file or directory
    Generate {
        #[arg(default_value = ".", help = "File or directory to document")]
        path: PathBuf,
        #[arg(long, short, help = "Write the run (fragments, failures, summary) as JSON")]
        output: Option<PathBuf>,
        #[arg(long, help = "LLM provider (openai, ollama)")]
        provider: Option<String>,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, help = "Attempts per unit, including the first")]
        max_attempts: Option<u32>,
    },

    /// Score generated documentation
    Evaluate {
        #[arg(help = "JSON written by `docloom generate --output`")]
        fragments: PathBuf,
        #[arg(long, short, default_value = ".", help = "Root the fragments were generated from")]
        path: PathBuf,
        #[arg(long, short, help = "JSON object mapping unit ids to reference documentation")]
        references: Option<PathBuf>,
        #[arg(long, short, help = "Write the report as JSON")]
        output: Option<PathBuf>,
        #[arg(long, default_value = "5", help = "Number of lowest-scoring units to list")]
        weakest: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'f', long, default_value = "toml", help = "Output format: toml, json")]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write the default configuration to .docloom/config.toml
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mdocloom encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "docloom=debug"
    } else if cli.quiet {
        "error"
    } else {
        "docloom=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            path,
            output,
            provider,
            model,
            max_attempts,
        } => {
            generate::run(generate::GenerateOptions {
                path,
                config: cli.config,
                output,
                provider,
                model,
                max_attempts,
            })?;
        }
        Commands::Evaluate {
            fragments,
            path,
            references,
            output,
            weakest,
        } => {
            evaluate::run(evaluate::EvaluateOptions {
                fragments,
                path,
                references,
                config: cli.config,
                output,
                weakest,
            })?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => config::show(cli.config.as_deref(), &format)?,
            ConfigAction::Path => config::path()?,
            ConfigAction::Init { force } => config::init(force)?,
        },
    }

    Ok(())
}
