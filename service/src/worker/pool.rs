//! Per-tenant worker pool (C8): fans a task's recipient list into a bounded channel,
//! N workers drain it under a priority-scoped rate limiter, call the chat send
//! primitive, classify errors, accumulate stats, and finalize the task.

use super::chat_client::{build_payload, ChatClient};
use crate::metrics::metrics;
use chrono::Utc;
use goblast_core::classify::{self, Action, ErrorKind};
use goblast_core::{DispatchMessage, Priority, Stats, TaskItem, TaskStatus, TaskStore};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

const NUM_WORKERS: usize = 10;
/// Depth 1: the closest async analogue to an unbuffered channel. A full channel
/// blocks the sender while workers are busy, which is the pool's backpressure
/// mechanism (spec §5).
const TASK_CHAN_DEPTH: usize = 1;

type SharedLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

fn quota_for(priority: Priority) -> Quota {
    match priority {
        Priority::High => Quota::per_second(nonzero!(30u32)),
        Priority::Medium => Quota::per_second(nonzero!(10u32)),
        Priority::Low => Quota::per_second(nonzero!(2u32)),
    }
    .allow_burst(nonzero!(1u32))
}

/// One limiter per priority class, resolving spec §9's Open Question in favor of
/// option (a): a shared, last-arrived-priority-wins limiter would starve whichever
/// priority didn't arrive last. Each worker looks up the limiter for the `TaskItem`
/// it is about to send, not for the pool as a whole.
fn build_limiters() -> HashMap<Priority, Arc<SharedLimiter>> {
    [Priority::High, Priority::Medium, Priority::Low]
        .into_iter()
        .map(|p| (p, Arc::new(RateLimiter::direct(quota_for(p)))))
        .collect()
}

struct PoolState {
    stats: HashMap<Uuid, Stats>,
}

/// A worker pool bound to one bot credential (`plain_token`). Cached and reused for
/// the process lifetime by the pool manager (C7); never evicted.
pub struct WorkerPool {
    sender: mpsc::Sender<TaskItem>,
    state: Arc<Mutex<PoolState>>,
}

impl WorkerPool {
    pub fn new(
        bot_token: String,
        chat_client: Arc<dyn ChatClient>,
        task_store: Arc<dyn TaskStore>,
        broker: Arc<dyn goblast_core::Broker>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(TASK_CHAN_DEPTH);
        let state = Arc::new(Mutex::new(PoolState {
            stats: HashMap::new(),
        }));
        let limiters = build_limiters();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        for worker_id in 0..NUM_WORKERS {
            tokio::spawn(worker_loop(
                worker_id,
                bot_token.clone(),
                receiver.clone(),
                limiters.clone(),
                chat_client.clone(),
                task_store.clone(),
                broker.clone(),
                state.clone(),
            ));
        }

        Self { sender, state }
    }

    /// `add_task(dispatch_msg)` (§4.4): register the expected recipient count under
    /// the pool mutex, then push one `TaskItem` per recipient. The send blocks while
    /// workers are busy — that backpressure is the point.
    pub async fn add_task(&self, msg: DispatchMessage) {
        {
            let mut state = self.state.lock().expect("pool mutex poisoned");
            let stats = state
                .stats
                .entry(msg.task_id)
                .or_insert_with(|| Stats::new(Utc::now()));
            stats.expected_count += msg.recipients.len() as u64;
        }

        for recipient in msg.recipients {
            let item = TaskItem {
                task_id: msg.task_id,
                recipient,
                content: msg.content.clone(),
                priority: msg.priority,
            };
            if self.sender.send(item).await.is_err() {
                tracing::error!(task_id = %msg.task_id, "worker pool channel closed");
                break;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    bot_token: String,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<TaskItem>>>,
    limiters: HashMap<Priority, Arc<SharedLimiter>>,
    chat_client: Arc<dyn ChatClient>,
    task_store: Arc<dyn TaskStore>,
    broker: Arc<dyn goblast_core::Broker>,
    state: Arc<Mutex<PoolState>>,
) {
    loop {
        let item = {
            let mut receiver = receiver.lock().await;
            match receiver.recv().await {
                Some(item) => item,
                None => return,
            }
        };

        process_item(
            worker_id,
            &bot_token,
            item,
            0,
            &limiters,
            &chat_client,
            &task_store,
            &broker,
            &state,
        )
        .await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_item(
    worker_id: usize,
    bot_token: &str,
    item: TaskItem,
    attempt: u32,
    limiters: &HashMap<Priority, Arc<SharedLimiter>>,
    chat_client: &Arc<dyn ChatClient>,
    task_store: &Arc<dyn TaskStore>,
    broker: &Arc<dyn goblast_core::Broker>,
    state: &Arc<Mutex<PoolState>>,
) {
    let limiter = limiters
        .get(&item.priority)
        .expect("a limiter exists for every priority")
        .clone();
    limiter.until_ready().await;

    let outcome = match build_payload(&item.content) {
        Ok(payload) => chat_client
            .send(bot_token, item.recipient, &payload)
            .await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => {
            increment_sent(state, task_store, broker, item.task_id, item.content.content_type)
                .await;
        }
        Err(message) => {
            handle_send_error(
                worker_id,
                bot_token.to_string(),
                item,
                attempt,
                message,
                limiters.clone(),
                chat_client.clone(),
                task_store.clone(),
                broker.clone(),
                state.clone(),
            )
            .await;
        }
    }
}

/// Boxed so the mutual recursion with `process_item` (via the `Retry` arm's spawned
/// continuation) has a concrete, non-opaque return type for the compiler to reason
/// about `Send`-ness over; otherwise resolving the two functions' opaque `impl Future`
/// types recurses into itself.
#[allow(clippy::too_many_arguments)]
fn handle_send_error(
    worker_id: usize,
    bot_token: String,
    item: TaskItem,
    attempt: u32,
    message: String,
    limiters: HashMap<Priority, Arc<SharedLimiter>>,
    chat_client: Arc<dyn ChatClient>,
    task_store: Arc<dyn TaskStore>,
    broker: Arc<dyn goblast_core::Broker>,
    state: Arc<Mutex<PoolState>>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        match classify::classify(&message, attempt) {
            Action::CountFailed { kind } => {
                if kind == ErrorKind::Unauthorized {
                    tracing::warn!(recipient = item.recipient, "admin notify: unauthorized bot token");
                }
                increment_failed(&state, &task_store, &broker, item.task_id, &message).await;
            }
            Action::BlockThenCountFailed { wait } => {
                tokio::time::sleep(wait).await;
                increment_failed(&state, &task_store, &broker, item.task_id, &message).await;
            }
            Action::Retry { delay } => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    process_item(
                        worker_id,
                        &bot_token,
                        item,
                        attempt + 1,
                        &limiters,
                        &chat_client,
                        &task_store,
                        &broker,
                        &state,
                    )
                    .await;
                });
            }
        }
    })
}

async fn increment_sent(
    state: &Arc<Mutex<PoolState>>,
    task_store: &Arc<dyn TaskStore>,
    broker: &Arc<dyn goblast_core::Broker>,
    task_id: Uuid,
    content_type: goblast_core::MessageType,
) {
    let finalized = {
        let mut state = state.lock().expect("pool mutex poisoned");
        if let Some(stats) = state.stats.get_mut(&task_id) {
            stats.increment_sent(content_type);
            if stats.is_complete() {
                state.stats.remove(&task_id)
            } else {
                None
            }
        } else {
            None
        }
    };
    if let Some(stats) = finalized {
        finalize(task_store, broker, task_id, stats).await;
    }
}

async fn increment_failed(
    state: &Arc<Mutex<PoolState>>,
    task_store: &Arc<dyn TaskStore>,
    broker: &Arc<dyn goblast_core::Broker>,
    task_id: Uuid,
    error_message: &str,
) {
    let kind = classify::classify_to_kind(error_message);
    let finalized = {
        let mut state = state.lock().expect("pool mutex poisoned");
        if let Some(stats) = state.stats.get_mut(&task_id) {
            stats.increment_failed(kind.as_str());
            if stats.is_complete() {
                state.stats.remove(&task_id)
            } else {
                None
            }
        } else {
            None
        }
    };
    if let Some(stats) = finalized {
        finalize(task_store, broker, task_id, stats).await;
    }
}

/// `finalize(task_id)` (§4.4): best-effort terminal notification. Errors from the
/// store write or the completion publish are logged and never block dropping the
/// in-memory stats entry (already dropped by the caller before this runs).
async fn finalize(
    task_store: &Arc<dyn TaskStore>,
    broker: &Arc<dyn goblast_core::Broker>,
    task_id: Uuid,
    mut stats: Stats,
) {
    if let Some(start) = stats.start_time {
        stats.time_spent_seconds = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
    }

    if let Err(err) = task_store
        .update_status_and_stats(task_id, TaskStatus::Complete, &stats)
        .await
    {
        tracing::error!(%task_id, error = %err, "finalize: failed to persist status and stats");
    }

    let completion = goblast_core::CompletionMessage {
        task_id,
        status: "complete",
        stats: stats.clone(),
    };
    match serde_json::to_value(&completion) {
        Ok(payload) => {
            if let Err(err) = broker.publish("tasks.complete", payload).await {
                tracing::error!(%task_id, error = %err, "finalize: failed to publish completion");
            }
        }
        Err(err) => {
            tracing::error!(%task_id, error = %err, "finalize: failed to serialize completion");
        }
    }

    metrics().tasks_completed_total.inc();
    metrics()
        .task_processing_duration_seconds
        .observe(stats.time_spent_seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_matches_the_priority_table() {
        assert_eq!(quota_for(Priority::High).burst_size().get(), 1);
        assert_eq!(quota_for(Priority::Medium).burst_size().get(), 1);
        assert_eq!(quota_for(Priority::Low).burst_size().get(), 1);

        // `Quota` doesn't expose its replenish-per-second rate directly, so exercise
        // it behaviorally: draining the burst token should force the next check to
        // fail fast for the slower priorities but not change relative ordering.
        let high = RateLimiter::direct(quota_for(Priority::High));
        let low = RateLimiter::direct(quota_for(Priority::Low));
        assert!(high.check().is_ok());
        assert!(low.check().is_ok());
        // Burst of 1 is now spent for both; an immediate second check must fail.
        assert!(high.check().is_err());
        assert!(low.check().is_err());
    }

    #[test]
    fn a_limiter_exists_for_every_priority() {
        let limiters = build_limiters();
        assert!(limiters.contains_key(&Priority::High));
        assert!(limiters.contains_key(&Priority::Medium));
        assert!(limiters.contains_key(&Priority::Low));
    }
}
