use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;

/// Run database migrations against the configured Postgres instance.
pub async fn run(cfg: &AppConfig) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database.connection_string())
        .await
        .context("connect database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("run migrations")?;

    tracing::info!("migrations complete");
    Ok(())
}
