//! stowage: command-line runner for the landing/archive pipeline.
//!
//! Extracts mapped objects into landing tables and copies landing tables into
//! their timestamped `archive_` counterparts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stowage_core::{defaults, logging, ArchivalReport, PipelineConfig, TableOutcome};
use stowage_db::{
    create_pool_with_config, log_pool_metrics, ArchiveOptions, PgStore, PoolConfig, TableArchiver,
};
use stowage_ingest::{source_for, ExtractionReport, FileOutcome, LandingLoader, S3Extractor};

#[derive(Parser)]
#[command(name = "stowage")]
#[command(author, version, about = "Landing-to-archive table pipeline")]
#[command(propagate_version = true)]
struct Cli {
    /// Pipeline configuration file
    #[arg(short, long, env = "STOWAGE_CONFIG", default_value = defaults::CONFIG_PATH, global = true)]
    config: PathBuf,

    /// Also write the run report as JSON to this path
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Copy every configured landing table into its archive table
    Archive,

    /// Load the configured S3 objects into landing tables
    Extract,

    /// Extract, then archive
    Run,
}

/// Everything a single invocation produced.
#[derive(Debug, Default, Serialize)]
struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    extraction: Option<ExtractionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archival: Option<ArchivalReport>,
}

impl RunReport {
    fn has_failures(&self) -> bool {
        self.extraction.as_ref().is_some_and(|r| r.has_failures())
            || self.archival.as_ref().is_some_and(|r| r.has_failures())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = init_tracing();

    match run(&cli).await {
        Ok(report) => {
            print_summary(&report);
            if report.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "info,sqlx=warn")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("stowage.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false)); // no ANSI in files by default
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

async fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    let config = load_config(&cli.config, std::env::var("DATABASE_URL").ok())?;
    info!(
        subsystem = logging::SUBSYSTEM_CLI,
        command = ?cli.command,
        config = %cli.config.display(),
        landing_schema = %config.schemas.landing,
        archive_schema = %config.schemas.archive,
        "Configuration loaded"
    );

    let store = connect(&config).await?;
    let mut report = RunReport::default();

    if matches!(cli.command, Commands::Extract | Commands::Run) {
        report.extraction = Some(extract(&config, &store).await?);
    }
    if matches!(cli.command, Commands::Archive | Commands::Run) {
        report.archival = Some(archive(&config, &store).await);
    }

    if let Some(ref path) = cli.report {
        let body = serde_json::to_vec_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    Ok(report)
}

/// Load the config file; `database_url` (from `DATABASE_URL`) wins over the file.
fn load_config(path: &Path, database_url: Option<String>) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if let Some(url) = database_url.filter(|u| !u.is_empty()) {
        config.database.url = Some(url);
    }
    Ok(config)
}

async fn connect(config: &PipelineConfig) -> anyhow::Result<PgStore> {
    let url = config.database.connection_url()?;
    let pool = create_pool_with_config(&url, PoolConfig::from(&config.database))
        .await
        .context("Failed to connect to database")?;
    log_pool_metrics(&pool);

    Ok(PgStore::new(pool).with_statement_timeout(config.database.statement_timeout()))
}

async fn extract(config: &PipelineConfig, store: &PgStore) -> anyhow::Result<ExtractionReport> {
    let s3 = config
        .s3
        .as_ref()
        .context("The `s3` config section is required to extract")?;
    let source = source_for(s3, &config.extract)?;
    info!(mode = %config.extract.mode, files = s3.files.len(), "Extracting objects");

    let loader = LandingLoader::new(store.clone(), config.schemas.landing.as_str());
    Ok(S3Extractor::new(source, loader, s3.files.clone())
        .extract_all()
        .await)
}

async fn archive(config: &PipelineConfig, store: &PgStore) -> ArchivalReport {
    TableArchiver::new(store.clone())
        .with_options(ArchiveOptions::from(&config.archive))
        .archive_tables(
            &config.tables.all(),
            &config.schemas.landing,
            &config.schemas.archive,
        )
        .await
}

fn print_summary(report: &RunReport) {
    if let Some(ref extraction) = report.extraction {
        for outcome in &extraction.outcomes {
            match outcome {
                FileOutcome::Loaded {
                    key,
                    table,
                    rows_loaded,
                } => println!("loaded   {} → {} ({} rows)", key, table, rows_loaded),
                FileOutcome::Skipped { key, .. } => println!("skipped  {}", key),
                FileOutcome::Failed { key, message, .. } => {
                    println!("FAILED   {}: {}", key, message)
                }
            }
        }
    }

    if let Some(ref archival) = report.archival {
        for outcome in &archival.outcomes {
            match outcome {
                TableOutcome::Archived(r) => println!(
                    "archived {} → {} ({} rows)",
                    r.source, r.destination, r.rows_moved
                ),
                TableOutcome::Failed(f) => println!("FAILED   {} [{}]: {}", f.table, f.kind, f.message),
            }
        }
        println!(
            "{} tables, {} rows moved",
            archival.outcomes.len(),
            archival.total_rows_moved()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    const CONFIG: &str = r#"
database:
  url: postgres://file/db
schemas:
  landing: landing
  archive: archive
tables:
  s3: [orders]
"#;

    fn config_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["stowage", "--config", "p.yaml", "archive"]).unwrap();
        assert_eq!(cli.command, Commands::Archive);
        assert_eq!(cli.config, PathBuf::from("p.yaml"));

        let cli = Cli::try_parse_from(["stowage", "run", "--report", "out.json"]).unwrap();
        assert_eq!(cli.command, Commands::Run);
        assert_eq!(cli.report, Some(PathBuf::from("out.json")));

        assert!(Cli::try_parse_from(["stowage"]).is_err());
    }

    #[test]
    fn test_database_url_override() {
        let file = config_file();

        let config = load_config(file.path(), None).unwrap();
        assert_eq!(config.database.url.as_deref(), Some("postgres://file/db"));

        let config = load_config(file.path(), Some("postgres://env/db".to_string())).unwrap();
        assert_eq!(config.database.url.as_deref(), Some("postgres://env/db"));

        let config = load_config(file.path(), Some(String::new())).unwrap();
        assert_eq!(config.database.url.as_deref(), Some("postgres://file/db"));
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Path::new("/nonexistent/stowage.yaml"), None).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/stowage.yaml"));
    }

    #[test]
    fn test_empty_report_has_no_failures() {
        let report = RunReport::default();
        assert!(!report.has_failures());
        assert_eq!(serde_json::to_string(&report).unwrap(), "{}");
    }
}
