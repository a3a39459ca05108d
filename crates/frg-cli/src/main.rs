//! frg - command-line front end for the Forge diagnostic bridge.

mod report;
mod terminal;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use frg_core::link::resolve_links;
use frg_core::publish::RecordingSink;
use frg_core::{
    BridgeConfig, BridgeError, CheckOutcome, Checker, DiagnosticSink, Publisher, RunSession,
    Supervisor, TempDirScratch, TextDocument, resolve_link,
};
use tracing_subscriber::EnvFilter;

use crate::report::{Reported, format_json, format_link, format_text};
use crate::terminal::{TerminalNavigator, TerminalOutput};

/// Config file picked up from the current directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = ".frg.toml";

#[derive(Parser)]
#[command(name = "frg")]
#[command(author, version, about = "Diagnostics and runs for Forge models")]
struct Cli {
    /// Config file (default: ./.frg.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Toolchain executable, overriding the config file
    #[arg(long, global = true)]
    racket: Option<String>,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a source file once and report the toolchain's diagnostic
    Check {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run a source file, relaying its output; Ctrl-C stops it
    Run { file: PathBuf },

    /// Resolve locators in terminal text read from stdin
    Links {
        /// Document the links should point into
        #[arg(long)]
        active: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("FRG_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref(), cli.racket)?;
    match cli.command {
        Commands::Check { file, format } => check(&file, &config, format).await,
        Commands::Run { file } => run_file(&file, &config).await,
        Commands::Links { active, format } => links(&active, &config, format),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// An explicit `--config` must load; a discovered `.frg.toml` that fails to
/// load only warns.
fn load_config(explicit: Option<&Path>, racket: Option<String>) -> Result<BridgeConfig> {
    let mut config = match explicit {
        Some(path) => BridgeConfig::load(path)?,
        None => {
            let discovered = Path::new(DEFAULT_CONFIG_FILE);
            if discovered.is_file() {
                let (config, warning) = BridgeConfig::load_or_default(Some(discovered));
                if let Some(warning) = warning {
                    eprintln!("{} {warning}", "warning:".yellow().bold());
                }
                config
            } else {
                BridgeConfig::default()
            }
        }
    };
    if let Some(racket) = racket {
        config.racket_path = racket;
    }
    tracing::debug!(racket = %config.racket_path, "configuration loaded");
    Ok(config)
}

fn read_source(file: &Path, config: &BridgeConfig) -> Result<(String, String)> {
    if !config.is_source_path(file) {
        return Err(BridgeError::NotSourceFile {
            path: file.to_path_buf(),
            extension: config.source_extension.clone(),
        }
        .into());
    }
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    Ok((file.display().to_string(), text))
}

async fn check(file: &Path, config: &BridgeConfig, format: OutputFormat) -> Result<ExitCode> {
    let (id, text) = read_source(file, config)?;
    let sink = Arc::new(RecordingSink::new());
    let publisher = Arc::new(Publisher::new(
        sink.clone() as Arc<dyn DiagnosticSink<String>>
    ));
    let scratch = Arc::new(TempDirScratch::new(
        config.scratch_dir(),
        config.source_extension.clone(),
    ));
    let checker = Checker::new(Supervisor::new(), scratch, publisher);

    let document = Arc::new(TextDocument::new(id.clone(), 0, text));
    let outcome = checker.validate(document, config).await;
    let diagnostics = sink.latest(&id);
    if let Err(e) = checker.close(&id) {
        tracing::warn!(error = %e, "failed to remove scratch file");
    }
    if let CheckOutcome::Failed(failure) = outcome? {
        tracing::info!(class = ?failure.class, located = failure.location.is_some(), "check failed");
    }

    let reported: Vec<_> = diagnostics.iter().map(|d| Reported::new(&id, d)).collect();
    match format {
        OutputFormat::Text => {
            for entry in &reported {
                println!("{}", format_text(entry));
            }
            if reported.is_empty() {
                println!("{} {}", "ok:".green().bold(), id);
            }
        }
        OutputFormat::Json => println!("{}", format_json(&reported)?),
    }

    Ok(if reported.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn run_file(file: &Path, config: &BridgeConfig) -> Result<ExitCode> {
    let (id, text) = read_source(file, config)?;
    let publisher = Arc::new(Publisher::new(
        Arc::new(RecordingSink::new()) as Arc<dyn DiagnosticSink<String>>
    ));
    let session = RunSession::new(
        Supervisor::new(),
        publisher,
        Arc::new(TerminalOutput),
        Arc::new(TerminalNavigator),
    );

    let document = Arc::new(TextDocument::new(id, 0, text));
    let finished = session.start(document, file, config)?;

    tokio::select! {
        outcome = finished => match outcome {
            Ok(outcome) if outcome.is_success() => Ok(ExitCode::SUCCESS),
            Ok(_) => Ok(ExitCode::from(1)),
            // The sender only goes away without a value when the run is
            // killed, which this command never does on its own.
            Err(_) => Ok(ExitCode::from(1)),
        },
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            session.stop();
            Ok(ExitCode::from(130))
        }
    }
}

fn links(active: &Path, config: &BridgeConfig, format: OutputFormat) -> Result<ExitCode> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read stdin")?;
    let chain = config.locator()?;

    match format {
        OutputFormat::Text => {
            for (index, line) in text.lines().enumerate() {
                if let Some(link) = resolve_link(&chain, line, active) {
                    println!("{}", format_link(index + 1, &link));
                }
            }
        }
        OutputFormat::Json => {
            let links = resolve_links(&chain, &text, active);
            println!("{}", serde_json::to_string_pretty(&links)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
