//! searchsync CLI entrypoint.
//!
//! This is the main entrypoint for the searchsync command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use searchsync::cli::{Cli, Commands, LogFormat, OutputFormatter};
use searchsync::config::{ConfigParser, ConfigValidator, SyncConfig, find_config_file};
use searchsync::error::Result;
use searchsync::kind::KindRegistry;
use searchsync::reconciler::Reconciler;
use searchsync::transport::HttpTransport;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr so that stdout carries only command output.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point.
///
/// Returns `false` when the command ran but some object failed.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<bool> {
    match cli.command {
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, formatter),
        Commands::Kinds => cmd_kinds(cli.config.as_ref(), formatter),
        Commands::List { kind } => cmd_list(cli.config.as_ref(), kind.as_deref(), formatter).await,
        Commands::Plan => cmd_plan(cli.config.as_ref(), formatter).await,
        Commands::Sync { workers } => cmd_sync(cli.config.as_ref(), workers, formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, show_warnings: bool, formatter: &OutputFormatter) -> Result<bool> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let config = load_config(&config_file)?;
    let result = ConfigValidator::new().validate(&config)?;

    emit(&formatter.format_validation(&result, config.resources.len(), show_warnings))?;
    Ok(true)
}

/// List registered kinds.
fn cmd_kinds(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let registry = match resolve_config_path(config_path) {
        Ok(config_file) => {
            let config = load_config(&config_file)?;
            ConfigValidator::new().build_registry(&config)?
        }
        Err(e) => {
            debug!("No configuration ({e}); showing built-in kinds only");
            KindRegistry::with_builtins()
        }
    };

    emit(&formatter.format_kinds(&registry))?;
    Ok(true)
}

/// Discover and print current objects.
async fn cmd_list(config_path: Option<&PathBuf>, kind: Option<&str>, formatter: &OutputFormatter) -> Result<bool> {
    let (config, registry) = load_validated(config_path)?;
    let transport = HttpTransport::new(&config.connection)?;
    let reconciler = Reconciler::new(&transport, &registry);

    let inventory = match kind {
        Some(kind) => reconciler.list_kind(kind).await?,
        None => reconciler.list().await,
    };

    emit(&formatter.format_inventory(&inventory, &registry))?;
    Ok(inventory.failures.is_empty())
}

/// Show the transitions a sync would apply.
async fn cmd_plan(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let (config, registry) = load_validated(config_path)?;
    let transport = HttpTransport::new(&config.connection)?;
    let reconciler = Reconciler::new(&transport, &registry);

    let report = reconciler.plan(&config.resources).await?;

    emit(&formatter.format_report(&report))?;
    Ok(report.is_success())
}

/// Run one reconciliation pass.
async fn cmd_sync(config_path: Option<&PathBuf>, workers: Option<usize>, formatter: &OutputFormatter) -> Result<bool> {
    let (config, registry) = load_validated(config_path)?;
    let transport = HttpTransport::new(&config.connection)?;
    let reconciler = Reconciler::new(&transport, &registry)
        .with_workers(workers.unwrap_or(config.sync.workers));

    let report = reconciler.sync(&config.resources).await?;

    emit(&formatter.format_report(&report))?;
    Ok(report.is_success())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads `.env` next to the configuration file, then the file itself with
/// environment overrides.
fn load_config(config_file: &Path) -> Result<SyncConfig> {
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;
    parser.load_with_env(config_file)
}

/// Loads and validates configuration and builds the kind registry.
fn load_validated(config_path: Option<&PathBuf>) -> Result<(SyncConfig, KindRegistry)> {
    let config_file = resolve_config_path(config_path)?;
    let config = load_config(&config_file)?;

    let validator = ConfigValidator::new();
    validator.validate(&config)?;
    let registry = validator.build_registry(&config)?;

    Ok((config, registry))
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
