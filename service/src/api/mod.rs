//! Submission gateway (C5) and the ambient auth boundary that gives callers a bearer
//! token to present to it.

pub mod auth;
pub mod tasks;

use crate::config::AppConfig;
use crate::metrics;
use anyhow::Context;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use goblast_core::lite::broker::NatsBroker;
use goblast_core::lite::jwt::{AuthSigner, Hs256AuthConfig};
use goblast_core::lite::task_store::PgTaskStore;
use goblast_core::lite::tenant_store::PgTenantStore;
use goblast_core::lite::vault::AesGcmVault;
use goblast_core::{Broker, Signer, TaskStore, TenantStore, Vault};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub tenants: Arc<dyn TenantStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub broker: Arc<dyn Broker>,
    pub signer: Arc<dyn Signer>,
    pub vault: Arc<dyn Vault>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/tasks", post(tasks::submit))
        .route("/api/tasks/:id", get(tasks::get_task))
        .route("/metrics", get(metrics_handler))
        .route_layer(axum::middleware::from_fn(metrics::track_requests))
        .with_state(state)
}

async fn metrics_handler() -> impl IntoResponse {
    ([(axum::http::header::CONTENT_TYPE, "text/plain")], metrics::render())
}

pub async fn run(cfg: &AppConfig) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database.connection_string())
        .await
        .context("connect database")?;

    let broker = NatsBroker::connect(&cfg.broker.url)
        .await
        .context("connect broker")?;

    let signer = AuthSigner::from_config(Hs256AuthConfig {
        secret: cfg.app.jwt_secret.clone(),
        ttl: Duration::from_secs(24 * 3600),
    })
    .context("init auth signer")?;

    let vault = AesGcmVault::new(cfg.encrypted.encryption_key.as_bytes()).context("init vault")?;

    let state = Arc::new(AppState {
        tenants: Arc::new(PgTenantStore::new(pool.clone())),
        tasks: Arc::new(PgTaskStore::new(pool)),
        broker: Arc::new(broker),
        signer: Arc::new(signer),
        vault: Arc::new(vault),
    });

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", cfg.app.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind api server to {addr}"))?;
    tracing::info!(%addr, "api server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve api")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("api server shutting down");
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        tracing::error!(error = %err, "api internal error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(serde_json::json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}
