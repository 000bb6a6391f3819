//! Worker pool manager (C7): one pool per distinct bot credential, created on demand.

use super::chat_client::ChatClient;
use super::pool::WorkerPool;
use goblast_core::{Broker, DispatchMessage, TaskStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct PoolManager {
    pools: Mutex<HashMap<String, Arc<WorkerPool>>>,
    chat_client: Arc<dyn ChatClient>,
    task_store: Arc<dyn TaskStore>,
    broker: Arc<dyn Broker>,
}

impl PoolManager {
    pub fn new(chat_client: Arc<dyn ChatClient>, task_store: Arc<dyn TaskStore>, broker: Arc<dyn Broker>) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            chat_client,
            task_store,
            broker,
        }
    }

    /// `start_task(token, dispatch_msg, store)` (§4.3): under the mutex, find or
    /// lazily construct the pool keyed by `bot_token`, then hand off the message.
    /// Pools are retained for the process lifetime — there is no idle eviction.
    pub async fn start_task(&self, bot_token: String, dispatch_msg: DispatchMessage) {
        let pool = {
            let mut pools = self.pools.lock().expect("pool manager mutex poisoned");
            pools
                .entry(bot_token.clone())
                .or_insert_with(|| {
                    Arc::new(WorkerPool::new(
                        bot_token,
                        self.chat_client.clone(),
                        self.task_store.clone(),
                        self.broker.clone(),
                    ))
                })
                .clone()
        };
        pool.add_task(dispatch_msg).await;
    }
}
