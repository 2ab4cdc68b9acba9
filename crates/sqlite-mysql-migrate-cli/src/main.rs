//! sqlite-mysql-migrate CLI - one-shot SQLite to MySQL/MariaDB migration.

use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use sqlite_mysql_migrate::{Config, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sqlite-mysql-migrate")]
#[command(about = "Copy a SQLite database into MySQL or MariaDB")]
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
    /// Migrate every selected table
    Run {
        /// Override source SQLite file
        #[arg(long)]
        source: Option<PathBuf>,

        /// Override target database name
        #[arg(long)]
        database: Option<String>,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override table collation
        #[arg(long)]
        collation: Option<String>,

        /// Drop each target table before creating it
        #[arg(long)]
        drop: bool,

        /// Skip the confirmation prompt for --drop
        #[arg(long, short)]
        yes: bool,

        /// Dry run: print the DDL without creating tables or copying rows
        #[arg(long)]
        dry_run: bool,
    },

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
            source,
            database,
            batch_size,
            collation,
            drop,
            yes,
            dry_run,
        } => {
            // Apply overrides
            if let Some(path) = source {
                config.source.path = path;
            }
            if let Some(db) = database {
                config.target.database = db;
            }
            if let Some(size) = batch_size {
                config.migration.batch_size = size;
            }
            if let Some(c) = collation {
                config.migration.collation = c;
            }
            if drop {
                config.migration.drop_first = true;
            }
            config.validate()?;

            if config.migration.drop_first && !dry_run && !yes {
                confirm_drop(&config)?;
            }

            let orchestrator = Orchestrator::new(config).await?;

            if dry_run {
                let plans = orchestrator.plan().await;
                orchestrator.close().await;
                let plans = plans?;

                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&plans)?);
                } else {
                    for plan in &plans {
                        println!("-- {}", plan.name);
                        match &plan.error {
                            Some(err) => println!("-- skipped: {}\n", err),
                            None => {
                                for stmt in &plan.statements {
                                    println!("{};\n", stmt);
                                }
                            }
                        }
                    }
                    println!("Dry run completed: {} tables", plans.len());
                }
                return Ok(());
            }

            let report = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("\nMigration finished!");
                println!("  Run ID: {}", report.run_id);
                println!("  Target: {} ({})", report.target, report.server_flavor);
                println!("  Duration: {:.2}s", report.duration_seconds);
                for table in &report.tables {
                    println!(
                        "  {:<30} {:?}: {} rows read, {} inserted, {}/{} batches",
                        table.name,
                        table.outcome,
                        table.rows_attempted,
                        table.rows_inserted,
                        table.batches_succeeded,
                        table.batches_attempted
                    );
                    if let Some(ref err) = table.error {
                        println!("    Error: {}", err);
                    }
                    for warning in &table.warnings {
                        println!("    Warning: {}", warning);
                    }
                }
            }

            report.ensure_complete()?;
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await;
            orchestrator.close().await;

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
                    "  Target ({}): {} ({}ms)",
                    result.server_flavor,
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
                return Err(MigrateError::connection(
                    "health-check",
                    "one or more databases failed the check",
                ));
            }
        }
    }

    Ok(())
}

/// Ask before dropping existing target tables.
fn confirm_drop(config: &Config) -> Result<(), MigrateError> {
    let prompt = format!(
        "Drop and recreate every migrated table in {}@{}:{}/{}?",
        config.target.user, config.target.host, config.target.port, config.target.database
    );
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| {
            MigrateError::Config(format!(
                "confirmation required for --drop (use --yes to skip): {}",
                e
            ))
        })?;

    if confirmed {
        Ok(())
    } else {
        Err(MigrateError::Config("migration cancelled".to_string()))
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

    // Logs go to stderr so --output-json stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
