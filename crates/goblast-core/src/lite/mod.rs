//! Concrete implementations of the `goblast-core` trait contracts.
//!
//! This module provides an AES-256-GCM credential vault, a NATS-backed broker adapter,
//! an HS256 bearer-token signer, and Postgres-backed tenant/task stores.

pub mod broker;
pub mod jwt;
pub mod task_store;
pub mod tenant_store;
pub mod vault;
