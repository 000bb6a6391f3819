//! Dispatch subscriber (C6): consumes `tasks.create` in the `worker-group` competing
//! consumer group, validates, resolves the tenant's decrypted token, and hands off to
//! the worker pool manager.

use super::pool_manager::PoolManager;
use goblast_core::{Broker, DispatchMessage, TenantStore, Vault};
use std::sync::Arc;

pub async fn run(
    broker: Arc<dyn Broker>,
    tenants: Arc<dyn TenantStore>,
    vault: Arc<dyn Vault>,
    pool_manager: Arc<PoolManager>,
) -> anyhow::Result<()> {
    let mut subscription = broker.subscribe("tasks.create", Some("worker-group")).await?;

    loop {
        let payload = match subscription.next().await {
            Some(payload) => payload,
            None => {
                tracing::warn!("tasks.create subscription closed");
                return Ok(());
            }
        };

        let dispatch_msg: DispatchMessage = match serde_json::from_value(payload) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed dispatch message");
                continue;
            }
        };

        handle_message(dispatch_msg, &tenants, &vault, &pool_manager).await;
    }
}

/// Any validation or resolution failure is logged and the message is dropped — no
/// requeue, no NAK (§4.2). The task row remains `scheduled` in that case (see the
/// orphaned-rows Open Question, preserved deliberately).
async fn handle_message(
    dispatch_msg: DispatchMessage,
    tenants: &Arc<dyn TenantStore>,
    vault: &Arc<dyn Vault>,
    pool_manager: &Arc<PoolManager>,
) {
    if let Err(err) = dispatch_msg.validate() {
        tracing::warn!(error = %err, "dropping invalid dispatch message");
        return;
    }

    let tenant = match tenants.find_by_id(dispatch_msg.tenant_id).await {
        Ok(Some(tenant)) => tenant,
        Ok(None) => {
            tracing::warn!(tenant_id = dispatch_msg.tenant_id, "dropping dispatch message: tenant not found");
            return;
        }
        Err(err) => {
            tracing::warn!(error = %err, "dropping dispatch message: tenant lookup failed");
            return;
        }
    };

    let plain_token = match vault.decrypt(&tenant.encrypted_token) {
        Ok(token) => token,
        Err(err) => {
            tracing::warn!(error = %err, "dropping dispatch message: token decrypt failed");
            return;
        }
    };

    pool_manager.start_task(plain_token, dispatch_msg).await;
}
