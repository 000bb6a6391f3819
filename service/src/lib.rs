//! GoBlast service: the submission gateway, dispatch subscriber and worker pools that
//! sit around `goblast-core`.

pub mod api;
pub mod config;
pub mod metrics;
pub mod migrate;
pub mod worker;
