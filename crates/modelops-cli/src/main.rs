use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod settings;

use cli::Cli;
use modelops_db::{PgSessionFactory, RunRepository};
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelops=info,modelops_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Run CLI
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    let database = settings
        .database(cli.database_url.as_deref())
        .context("no database configured: pass --database-url or set DATABASE_URL")?;

    tracing::info!(
        "Connecting to database ({} connections max)",
        database.max_connections
    );
    let sessions = PgSessionFactory::connect(&database).await?;
    let repository = RunRepository::new(sessions.clone()).with_config(settings.repository);

    commands::execute(cli.command, &sessions, &repository, cli.json).await
}
