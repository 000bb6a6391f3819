//! End-to-end coverage of the submission gateway (C5) against in-memory fakes for
//! every `goblast-core` trait, wired into the real router.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use goblast_core::{
    Broker, MessageType, Priority, Signer, Stats, Subscription, Task, TaskStatus, TaskStore,
    Tenant, TenantStore, Vault,
};
use goblast_service::api::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct FakeVault;

impl Vault for FakeVault {
    fn encrypt(&self, plaintext: &str) -> goblast_core::Result<String> {
        Ok(format!("enc:{plaintext}"))
    }

    fn decrypt(&self, encoded: &str) -> goblast_core::Result<String> {
        encoded
            .strip_prefix("enc:")
            .map(|s| s.to_string())
            .ok_or_else(|| goblast_core::Error::msg("bad ciphertext"))
    }
}

struct FakeSigner;

impl Signer for FakeSigner {
    fn issue(&self, user_id: i64) -> goblast_core::Result<String> {
        Ok(format!("token-for-{user_id}"))
    }

    fn verify(&self, token: &str) -> goblast_core::Result<goblast_core::AuthClaims> {
        let user_id = token
            .strip_prefix("token-for-")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| goblast_core::Error::msg("malformed token"))?;
        Ok(goblast_core::AuthClaims {
            user_id,
            iat: 0,
            exp: 0,
        })
    }
}

struct FakeTenantStore {
    next_id: AtomicI64,
    tenants: Mutex<Vec<Tenant>>,
}

impl FakeTenantStore {
    fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            tenants: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TenantStore for FakeTenantStore {
    async fn create(&self, username: &str, encrypted_token: &str) -> goblast_core::Result<Tenant> {
        let mut tenants = self.tenants.lock().unwrap();
        if tenants.iter().any(|t| t.username == username) {
            return Err(goblast_core::Error::msg("username already exists"));
        }
        let tenant = Tenant {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            username: username.to_string(),
            encrypted_token: encrypted_token.to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn find_by_username(&self, username: &str) -> goblast_core::Result<Option<Tenant>> {
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> goblast_core::Result<Option<Tenant>> {
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }
}

struct FakeTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl FakeTaskStore {
    fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TaskStore for FakeTaskStore {
    async fn insert_scheduled(
        &self,
        id: Uuid,
        tenant_id: i64,
        message_type: MessageType,
        content_json: Value,
        priority: Priority,
        schedule: Option<chrono::DateTime<chrono::Utc>>,
    ) -> goblast_core::Result<Task> {
        let task = Task {
            id,
            tenant_id,
            message_type,
            content_json,
            priority,
            schedule,
            status: TaskStatus::Scheduled,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            stats_json: None,
            deleted_at: None,
        };
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task)
    }

    async fn find_by_id(&self, id: Uuid) -> goblast_core::Result<Option<Task>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn update_status_and_stats(
        &self,
        id: Uuid,
        status: TaskStatus,
        stats: &Stats,
    ) -> goblast_core::Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
            task.status = status;
            task.stats_json = Some(serde_json::to_value(stats).unwrap());
        }
        Ok(())
    }
}

/// Records every published subject/payload pair so tests can assert on ordering
/// (invariant I7: the row exists in the store before `tasks.create` is published).
struct RecordingBroker {
    published: Mutex<Vec<(String, Value)>>,
}

impl RecordingBroker {
    fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn publish(&self, subject: &str, payload: Value) -> goblast_core::Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), payload));
        Ok(())
    }

    async fn subscribe(
        &self,
        _subject: &str,
        _queue_group: Option<&str>,
    ) -> goblast_core::Result<Box<dyn Subscription>> {
        unimplemented!("not exercised by the HTTP-facing tests")
    }
}

fn test_app() -> (Arc<AppState>, Arc<FakeTaskStore>, Arc<RecordingBroker>) {
    let tasks = Arc::new(FakeTaskStore::new());
    let broker = Arc::new(RecordingBroker::new());
    let state = Arc::new(AppState {
        tenants: Arc::new(FakeTenantStore::new()),
        tasks: tasks.clone(),
        broker: broker.clone(),
        signer: Arc::new(FakeSigner),
        vault: Arc::new(FakeVault),
    });
    (state, tasks, broker)
}

async fn json_request(router: axum::Router, method: &str, uri: &str, auth: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = auth {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn register_then_login_then_submit_a_text_broadcast() {
    let (state, tasks, broker) = test_app();
    let router = build_router(state);

    let (status, _) = json_request(
        router.clone(),
        "POST",
        "/api/auth/register",
        None,
        json!({ "username": "acme", "token": "bot-token-123" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = json_request(
        router.clone(),
        "POST",
        "/api/auth/login",
        None,
        json!({ "username": "acme", "token": "bot-token-123" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let jwt = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = json_request(
        router.clone(),
        "POST",
        "/api/tasks",
        Some(&jwt),
        json!({
            "recipients": [1, 2, 3],
            "content": { "type": "text", "text": "hello" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "scheduled");
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    // Invariant I7: by the time the request returns, the task row already exists.
    let stored_id = Uuid::parse_str(&task_id).unwrap();
    assert!(tasks.find_by_id(stored_id).await.unwrap().is_some());

    // And the published message references that same row.
    let published = broker.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "tasks.create");
    assert_eq!(published[0].1["task_id"], task_id);
}

#[tokio::test]
async fn login_rejects_wrong_token() {
    let (state, _tasks, _broker) = test_app();
    let router = build_router(state);

    json_request(
        router.clone(),
        "POST",
        "/api/auth/register",
        None,
        json!({ "username": "acme", "token": "bot-token-123" }),
    )
    .await;

    let (status, _) = json_request(
        router,
        "POST",
        "/api/auth/login",
        None,
        json!({ "username": "acme", "token": "wrong-token" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_rejects_duplicate_username() {
    let (state, _tasks, _broker) = test_app();
    let router = build_router(state);

    let body = json!({ "username": "acme", "token": "bot-token-123" });
    json_request(router.clone(), "POST", "/api/auth/register", None, body.clone()).await;
    let (status, _) = json_request(router, "POST", "/api/auth/register", None, body).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_rejects_media_content_without_a_media_reference() {
    let (state, _tasks, _broker) = test_app();
    let router = build_router(state);

    json_request(
        router.clone(),
        "POST",
        "/api/auth/register",
        None,
        json!({ "username": "acme", "token": "bot-token-123" }),
    )
    .await;
    let (_, body) = json_request(
        router.clone(),
        "POST",
        "/api/auth/login",
        None,
        json!({ "username": "acme", "token": "bot-token-123" }),
    )
    .await;
    let jwt = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = json_request(
        router,
        "POST",
        "/api/tasks",
        Some(&jwt),
        json!({
            "recipients": [1],
            "content": { "type": "photo" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "media_url is required for type 'photo'");
}

#[tokio::test]
async fn submit_without_a_bearer_token_is_unauthorized() {
    let (state, _tasks, _broker) = test_app();
    let router = build_router(state);

    let (status, _) = json_request(
        router,
        "POST",
        "/api/tasks",
        None,
        json!({
            "recipients": [1],
            "content": { "type": "text", "text": "hi" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn get_task_returns_404_for_unknown_id() {
    let (state, _tasks, _broker) = test_app();
    let router = build_router(state);

    json_request(
        router.clone(),
        "POST",
        "/api/auth/register",
        None,
        json!({ "username": "acme", "token": "bot-token-123" }),
    )
    .await;
    let (_, body) = json_request(
        router.clone(),
        "POST",
        "/api/auth/login",
        None,
        json!({ "username": "acme", "token": "bot-token-123" }),
    )
    .await;
    let jwt = body["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = json_request(
        router,
        "GET",
        &format!("/api/tasks/{}", Uuid::new_v4()),
        Some(&jwt),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
