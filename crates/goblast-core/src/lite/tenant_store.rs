//! Postgres-backed tenant store (C2): lookup by username/id, insert on registration.

use crate::{Error, Result, Tenant, TenantStore};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn create(&self, username: &str, encrypted_token: &str) -> Result<Tenant> {
        let row = sqlx::query(
            r#"
            INSERT INTO auth_users (username, token, created_at, updated_at)
            VALUES ($1, $2, now(), now())
            RETURNING id, username, token, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(encrypted_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::msg(format!("username '{username}' already exists"))
            }
            _ => Error::from(anyhow::Error::from(e).context("insert auth_users")),
        })?;

        row_to_tenant(row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, token, created_at, updated_at
            FROM auth_users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("select auth_users by username")?;

        row.map(row_to_tenant).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, token, created_at, updated_at
            FROM auth_users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select auth_users by id")?;

        row.map(row_to_tenant).transpose()
    }
}

fn row_to_tenant(row: sqlx::postgres::PgRow) -> Result<Tenant> {
    Ok(Tenant {
        id: row.try_get("id").context("id")?,
        username: row.try_get("username").context("username")?,
        encrypted_token: row.try_get("token").context("token")?,
        created_at: row.try_get("created_at").context("created_at")?,
        updated_at: row.try_get("updated_at").context("updated_at")?,
    })
}
