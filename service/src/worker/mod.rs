pub mod chat_client;
pub mod pool;
pub mod pool_manager;
pub mod subscriber;

use crate::config::AppConfig;
use anyhow::Context;
use chat_client::HttpChatClient;
use goblast_core::lite::broker::NatsBroker;
use goblast_core::lite::task_store::PgTaskStore;
use goblast_core::lite::tenant_store::PgTenantStore;
use goblast_core::lite::vault::AesGcmVault;
use pool_manager::PoolManager;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

pub async fn run(cfg: &AppConfig) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database.connection_string())
        .await
        .context("connect database")?;

    let broker: Arc<dyn goblast_core::Broker> = Arc::new(
        NatsBroker::connect(&cfg.broker.url)
            .await
            .context("connect broker")?,
    );
    let tenants: Arc<dyn goblast_core::TenantStore> = Arc::new(PgTenantStore::new(pool.clone()));
    let tasks: Arc<dyn goblast_core::TaskStore> = Arc::new(PgTaskStore::new(pool));
    let vault: Arc<dyn goblast_core::Vault> =
        Arc::new(AesGcmVault::new(cfg.encrypted.encryption_key.as_bytes()).context("init vault")?);
    let chat_client: Arc<dyn chat_client::ChatClient> =
        Arc::new(HttpChatClient::new("https://api.chat-platform.example".to_string()));

    let pool_manager = Arc::new(PoolManager::new(chat_client, tasks, broker.clone()));

    tracing::info!("worker subscribing to tasks.create");
    tokio::select! {
        res = subscriber::run(broker, tenants, vault, pool_manager) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("worker shutting down");
            Ok(())
        }
    }
}
