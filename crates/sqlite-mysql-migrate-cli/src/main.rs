//! sqlite-mysql-migrate CLI - copy a SQLite database into MySQL.

use clap::{Parser, Subcommand};
use sqlite_mysql_migrate::{
    Config, MigrateError, MigrationResult, Migrator, RunMode, SqliteReader, SourceReader,
    TableOutcome, TablePlan,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sqlite-mysql-migrate")]
#[command(about = "Copy every table of a SQLite database into an existing MySQL schema")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Truncate the target tables and copy every source row
    Run {
        /// Dry run: read and report without writing to the target
        #[arg(long)]
        dry_run: bool,

        /// Override rows per INSERT batch
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override the SQLite database path
        #[arg(long)]
        source_path: Option<PathBuf>,
    },

    /// Print the order in which tables are copied
    Plan,

    /// Validate row counts between source and target
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            dry_run,
            chunk_size,
            source_path,
        } => {
            // Apply overrides
            if let Some(size) = chunk_size {
                config.migration.chunk_size = size;
            }
            if let Some(path) = source_path {
                config.source.path = path;
            }
            config.validate()?;

            let mode = RunMode::from_dry_run(dry_run);
            let migrator = Migrator::connect(&config, mode).await?;
            let result = migrator.run().await;
            migrator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }
        }

        Commands::Plan => {
            let source = SqliteReader::new(&config.source).await?;
            let discovered = source.list_tables().await;
            source.close().await;
            let plan = TablePlan::from_config(&config.migration, &discovered?);

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(plan.tables())?);
            } else {
                println!("Table plan ({} tables):", plan.len());
                for (idx, table) in plan.tables().iter().enumerate() {
                    println!("  {:>3}. {}", idx + 1, table);
                }
            }
        }

        Commands::Validate => {
            let migrator = Migrator::connect(&config, RunMode::DryRun).await?;
            let checks = migrator.validate().await;
            migrator.close().await;
            let checks = checks?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&checks)?);
            } else {
                let mismatched = checks.iter().filter(|c| !c.matches).count();
                println!("Row count validation:");
                for check in &checks {
                    let target = match (check.target_rows, &check.target_error) {
                        (Some(rows), _) => rows.to_string(),
                        (None, Some(err)) => format!("error: {}", err),
                        (None, None) => "unknown".to_string(),
                    };
                    println!(
                        "  {} {} (source: {}, target: {})",
                        if check.matches { "OK  " } else { "DIFF" },
                        check.table,
                        check.source_rows,
                        target
                    );
                }
                println!(
                    "\n  {} of {} tables match",
                    checks.len() - mismatched,
                    checks.len()
                );
            }
        }

        Commands::HealthCheck => {
            let migrator = Migrator::connect(&config, RunMode::DryRun).await?;
            let result = migrator.health_check().await;
            migrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (MySQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::pool("Health check failed", "testing connections"));
            }
        }
    }

    Ok(())
}

fn print_summary(result: &MigrationResult) {
    let status_msg = if result.mode.is_dry_run() {
        "Dry run completed!"
    } else {
        "Migration completed!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Tables: {} copied, {} skipped, {} partial, {} failed",
        result.tables_success(),
        result.tables_skipped(),
        result.tables_partial(),
        result.tables_failed()
    );
    println!("  Rows: {}", result.rows_transferred());

    for report in &result.tables {
        match &report.outcome {
            TableOutcome::PartialFailure { failed_rows, .. } => {
                println!("  {}: {} rows failed", report.table, failed_rows.len());
            }
            TableOutcome::Failed { reason } => {
                println!("  {}: failed ({})", report.table, reason);
            }
            _ => {}
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries results
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
