//! Configuration loading.
//!
//! Idiomatic notes carried over from the service this was adapted from:
//! - Prefer explicit types over loosely-typed maps for config.
//! - Parse once at startup; pass `&AppConfig` through constructors.
//! - Avoid global mutable state.
//!
//! Layered sources, later wins: a file under `CONFIG_PATH` (default `./configs`), then
//! `GOBLAST_`-prefixed environment variables with `__` as the nesting separator (e.g.
//! `GOBLAST_DATABASE__HOST`).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_environment")]
    pub environment: String,
    pub jwt_secret: String,
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> String {
    "development".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_sslmode() -> String {
    "disable".to_string()
}

impl DatabaseSection {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, self.sslmode
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSection {
    #[serde(default = "default_broker_url")]
    pub url: String,
}

fn default_broker_url() -> String {
    "nats://localhost:4222".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptedSection {
    pub encryption_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,
    pub database: DatabaseSection,
    pub broker: BrokerSection,
    pub encrypted: EncryptedSection,
}

impl AppConfig {
    /// Load from `{CONFIG_PATH:-./configs}/config.{yaml,toml,json,...}`, merged with
    /// `GOBLAST_`-prefixed environment variables (double underscore nesting).
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "./configs".to_string());

        let cfg = config::Config::builder()
            .add_source(config::File::with_name(&format!("{config_path}/config")).required(false))
            .add_source(
                config::Environment::with_prefix("GOBLAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}
