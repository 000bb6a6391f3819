//! Shared core abstractions for the GoBlast dispatch engine.
//!
//! This crate defines cross-crate contracts used by the `service` binary: the credential
//! vault, the tenant/task stores, the broker adapter, the capability signer, and the domain
//! types and error classifier that the worker pool operates on.
//!
//! # API notes
//! `goblast-core` is an internal crate (`publish = false`). Its public API uses a few
//! third-party types (`uuid::Uuid`, `chrono::DateTime<Utc>`, `serde_json::Value`) directly
//! rather than re-wrapping them.

use async_trait::async_trait;
use std::fmt;

pub mod classify;
pub mod lite;
pub mod types;

pub use types::{
    CompletionMessage, Content, DispatchMessage, MessageType, Priority, Stats, Task, TaskItem,
    TaskStatus, Tenant,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    inner: anyhow::Error,
}

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            inner: anyhow::anyhow!(message.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self { inner: value }
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        Self {
            inner: anyhow::Error::from(value),
        }
    }
}

/// Symmetric encrypt/decrypt of tenant chat-platform tokens (C1).
pub trait Vault: Send + Sync {
    /// Encrypt `plaintext`, returning the base64 storage encoding
    /// (`base64(nonce || ciphertext || tag)`).
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt a base64 storage encoding back to plaintext. Rejects input shorter
    /// than the nonce size.
    fn decrypt(&self, encoded: &str) -> Result<String>;
}

/// Publish/subscribe over a named subject with queue-group semantics for competing
/// consumers (C4).
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, subject: &str, payload: serde_json::Value) -> Result<()>;

    /// Subscribe as part of `queue_group` (competing consumers); `None` means no
    /// queue group (fan-out to every subscriber).
    async fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
    ) -> Result<Box<dyn Subscription>>;
}

#[async_trait]
pub trait Subscription: Send {
    /// Block until the next message arrives, or `None` if the subscription closed.
    async fn next(&mut self) -> Option<serde_json::Value>;
}

/// Issue and verify the bearer JWTs used on the HTTP submission boundary.
pub trait Signer: Send + Sync {
    fn issue(&self, user_id: i64) -> Result<String>;
    fn verify(&self, token: &str) -> Result<AuthClaims>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthClaims {
    pub user_id: i64,
    pub iat: usize,
    pub exp: usize,
}

/// Lookup tenant records by id and persist new registrations (C2).
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn create(&self, username: &str, encrypted_token: &str) -> Result<Tenant>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Tenant>>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>>;
}

/// Persist task records and terminal status + stats (C3).
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_scheduled(
        &self,
        id: uuid::Uuid,
        tenant_id: i64,
        message_type: MessageType,
        content_json: serde_json::Value,
        priority: Priority,
        schedule: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Task>;

    async fn find_by_id(&self, id: uuid::Uuid) -> Result<Option<Task>>;

    async fn update_status_and_stats(
        &self,
        id: uuid::Uuid,
        status: TaskStatus,
        stats: &Stats,
    ) -> Result<()>;
}
