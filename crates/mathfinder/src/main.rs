//! Mathfinder model monitoring
//!
//! Tests registered models against fresh data, reports drift to their owners
//! and runs batch predictions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use config::Config;
use database::{create_pool, run_migrations};
use mathfinder::commands;
use mathfinder::commands::ColumnOverrides;
use mathfinder::commands::register::Registration;
use model_structs::{ColumnSpec, ModelSchema};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

/// Mathfinder model monitoring
#[derive(Parser)]
#[command(name = "mathfinder")]
#[command(about = "Drift monitoring and batch prediction for symbolic-regression models")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test every due model and mail the outcome to its owner
    Monitor {
        /// Exit with an error if any model faulted or a report was not delivered
        #[arg(long)]
        strict: bool,
    },

    /// Score a model on a CSV file against its original error
    Test {
        /// Model name
        #[arg(short, long)]
        model: String,

        /// Path to the CSV file with feature and target columns
        #[arg(short, long)]
        file: PathBuf,

        /// Model version (uses latest if not specified)
        #[arg(long)]
        version: Option<i32>,

        /// Feature columns, separated by ';' (defaults to the registered ones)
        #[arg(long)]
        features: Option<String>,

        /// Target columns, separated by ';' (defaults to the registered ones)
        #[arg(long)]
        targets: Option<String>,
    },

    /// Append a model's predictions to every row of a CSV file
    Predict {
        /// Model name
        #[arg(short, long)]
        model: String,

        /// Path to the CSV file with the feature columns
        #[arg(short, long)]
        file: PathBuf,

        /// Where to write the CSV with predictions
        #[arg(short, long)]
        output: PathBuf,

        /// Model version (uses latest if not specified)
        #[arg(long)]
        version: Option<i32>,

        /// Feature columns, separated by ';' (defaults to the registered ones)
        #[arg(long)]
        features: Option<String>,
    },

    /// Register a trained model version and start monitoring it
    Register {
        /// Model name
        #[arg(short, long)]
        model: String,

        /// Path to the equations artifact (JSON)
        #[arg(short, long)]
        artifact: PathBuf,

        /// Feature columns, separated by ';'
        #[arg(long)]
        features: String,

        /// Target columns, separated by ';'
        #[arg(long)]
        targets: String,

        /// Mean absolute error measured at training time
        #[arg(long)]
        mae: f64,

        /// Owner's email address
        #[arg(long)]
        owner: String,

        /// Days between automatic tests
        #[arg(long, default_value = "7")]
        frequency: i32,
    },

    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_logging(&config.log_dir, cli.verbose)?;

    let pool = create_pool(&config.database_url).await?;

    match cli.command {
        Commands::Monitor { strict } => {
            commands::monitor::run(&pool, &config, strict).await?;
        }
        Commands::Test {
            model,
            file,
            version,
            features,
            targets,
        } => {
            let overrides = ColumnOverrides::parse(features.as_deref(), targets.as_deref())?;
            commands::test::run(&pool, &config, &model, version, &file, &overrides).await?;
        }
        Commands::Predict {
            model,
            file,
            output,
            version,
            features,
        } => {
            let overrides = ColumnOverrides::parse(features.as_deref(), None)?;
            commands::predict::run(
                &pool,
                &config,
                &model,
                version,
                &file,
                &output,
                overrides.features,
            )
            .await?;
        }
        Commands::Register {
            model,
            artifact,
            features,
            targets,
            mae,
            owner,
            frequency,
        } => {
            let schema = ModelSchema {
                features: features.parse::<ColumnSpec>().context("invalid feature columns")?,
                targets: targets.parse::<ColumnSpec>().context("invalid target columns")?,
            };
            let registration = Registration {
                name: model,
                owner_email: owner,
                test_frequency_days: frequency,
                schema,
                artifact,
                training_mae: mae,
            };
            commands::register::run(&pool, &config, registration).await?;
        }
        Commands::Migrate => {
            run_migrations(&pool).await?;
            info!("Migrations completed successfully");
        }
    }

    Ok(())
}

/// Logs to the console and to a new timestamped file under `log_dir`.
fn init_logging(log_dir: &Path, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let log_path = log_dir.join(format!("{}.log", Local::now().format("%Y_%m_%d_%H_%M_%S")));
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stdout);

    // File layer
    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
