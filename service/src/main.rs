use clap::{Parser, Subcommand};
use goblast_service::{api, config, migrate, worker};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "goblast")]
#[command(about = "GoBlast multi-tenant broadcast dispatcher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run database migrations.
    Migrate,

    /// Run the submission gateway + task lookup HTTP server (C5).
    Api,

    /// Run the dispatch subscriber and per-tenant worker pools (C6-C10).
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::AppConfig::load()?;

    match cli.command {
        Command::Migrate => migrate::run(&cfg).await,
        Command::Api => api::run(&cfg).await,
        Command::Worker => worker::run(&cfg).await,
    }
}
