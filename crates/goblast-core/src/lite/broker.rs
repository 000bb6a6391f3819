//! NATS-backed broker adapter (C4): publish/subscribe over a named subject with
//! queue-group semantics for competing consumers.

use crate::{Broker, Error, Result, Subscription};
use async_nats::Client;
use async_trait::async_trait;
use futures::StreamExt;

#[derive(Clone)]
pub struct NatsBroker {
    client: Client,
}

impl NatsBroker {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| Error::msg(format!("connect to broker: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn publish(&self, subject: &str, payload: serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| Error::msg(format!("serialize payload: {e}")))?;
        self.client
            .publish(subject.to_string(), bytes.into())
            .await
            .map_err(|e| Error::msg(format!("publish to {subject}: {e}")))?;
        self.client
            .flush()
            .await
            .map_err(|e| Error::msg(format!("flush publish to {subject}: {e}")))?;
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
    ) -> Result<Box<dyn Subscription>> {
        let subscriber = match queue_group {
            Some(group) => self
                .client
                .queue_subscribe(subject.to_string(), group.to_string())
                .await
                .map_err(|e| Error::msg(format!("queue_subscribe {subject}/{group}: {e}")))?,
            None => self
                .client
                .subscribe(subject.to_string())
                .await
                .map_err(|e| Error::msg(format!("subscribe {subject}: {e}")))?,
        };
        Ok(Box::new(NatsSubscription { subscriber }))
    }
}

struct NatsSubscription {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Option<serde_json::Value> {
        loop {
            let message = self.subscriber.next().await?;
            match serde_json::from_slice(&message.payload) {
                Ok(value) => return Some(value),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed broker message");
                    continue;
                }
            }
        }
    }
}
