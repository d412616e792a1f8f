use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod wiring;

#[derive(Parser)]
#[command(name = "archive-cli")]
#[command(about = "Historical web archive ingestion and query operator CLI")]
struct Cli {
    /// Path to a TOML config file (spec §6). Falls back to built-in defaults.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the archive router for a domain's capture history
    Query(commands::query::QueryArgs),
    /// Run a single URL's HTML through the extraction cascade
    Extract(commands::extract::ExtractArgs),
    /// Route one SQL-like statement through the hybrid query router
    Sql(commands::sql::SqlArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => archive_common::SystemConfig::load(path)?,
        None => archive_common::SystemConfig::default(),
    };

    match cli.command {
        Commands::Query(args) => commands::query::run(args, &config).await,
        Commands::Extract(args) => commands::extract::run(args, &config).await,
        Commands::Sql(args) => commands::sql::run(args, &config).await,
    }
}
