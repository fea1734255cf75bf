//! Thin CLI wrapping the compiled-in schema migrations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use server_core::config::Config;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "migrate_cli")]
#[command(about = "Apply or inspect database schema migrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations.
    Run,
    /// Print applied migration versions.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Commands::Run => {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("failed to run migrations")?;
            println!("migrations applied");
        }
        Commands::Status => {
            let rows: Vec<(i64, String)> = sqlx::query_as(
                "SELECT version, description FROM _sqlx_migrations ORDER BY version",
            )
            .fetch_all(&pool)
            .await
            .context("failed to read migration history (has `run` ever been called?)")?;

            for (version, description) in rows {
                println!("{version}\t{description}");
            }
        }
    }

    Ok(())
}
