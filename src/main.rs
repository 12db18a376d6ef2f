//! # Beam Analytics Main Entry Point
//!
//! Loads layered configuration, initialises tracing, applies migrations and
//! serves the API. `migrate` applies migrations and exits.

use anyhow::{Context, Result};
use beam_analytics::{config::ConfigLoader, db, server::run_server, telemetry};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "beam-analytics", version, about = "Multi-tenant spreadsheet analytics API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and start the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;

    telemetry::init_tracing(&config).context("initializing tracing")?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    match config.redacted_json() {
        Ok(redacted) => tracing::debug!(config = %redacted, "Effective configuration"),
        Err(err) => tracing::warn!(error = %err, "Could not render redacted configuration"),
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    db::run_migrations(&db).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            tracing::info!("Migrations complete");
            Ok(())
        }
        Command::Serve => run_server(config, db).await,
    }
}
