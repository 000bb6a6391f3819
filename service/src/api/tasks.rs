use super::auth::AuthUser;
use super::{ApiError, ApiResult, AppState};
use crate::metrics::metrics;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use goblast_core::{Content, DispatchMessage, Priority};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub recipients: Vec<i64>,
    pub content: Content,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub schedule: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TaskSubmitData {
    pub task_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TaskSubmitResponse {
    pub success: bool,
    pub data: TaskSubmitData,
}

/// `submit(tenant_id, request) -> {task_id, status="scheduled"} | error` (C5).
///
/// Persist-then-publish: the row is inserted as `scheduled` before the dispatch
/// message is published, so a subscriber can never observe a `task_id` absent from
/// the store.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    AuthUser { user_id }: AuthUser,
    Json(req): Json<TaskRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<TaskSubmitResponse>)> {
    if req.recipients.is_empty() {
        metrics().tasks_failed_total.inc();
        return Err(ApiError::bad_request("recipients must be non-empty"));
    }
    if let Err(message) = req.content.validate() {
        metrics().tasks_failed_total.inc();
        return Err(ApiError::bad_request(message));
    }

    let priority = req.priority.unwrap_or_default();
    let content_json = serde_json::to_value(&req.content).map_err(|e| {
        metrics().tasks_failed_total.inc();
        ApiError::internal(e)
    })?;
    let task_id = Uuid::new_v4();

    let task = state
        .tasks
        .insert_scheduled(
            task_id,
            user_id,
            req.content.content_type,
            content_json,
            priority,
            req.schedule,
        )
        .await
        .map_err(|e| {
            metrics().tasks_failed_total.inc();
            ApiError::internal(e)
        })?;

    let dispatch = DispatchMessage {
        task_id: task.id,
        tenant_id: user_id,
        recipients: req.recipients,
        content: req.content,
        priority,
    };
    let payload = serde_json::to_value(&dispatch).map_err(|e| {
        metrics().tasks_failed_total.inc();
        ApiError::internal(e)
    })?;

    state.broker.publish("tasks.create", payload).await.map_err(|e| {
        metrics().tasks_failed_total.inc();
        ApiError::internal(e)
    })?;

    metrics().tasks_created_total.inc();

    Ok((
        axum::http::StatusCode::CREATED,
        Json(TaskSubmitResponse {
            success: true,
            data: TaskSubmitData {
                task_id: task.id,
                status: "scheduled",
            },
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub data: goblast_core::Task,
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    AuthUser { .. }: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let task = state
        .tasks
        .find_by_id(id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("task not found"))?;

    Ok(Json(TaskResponse {
        success: true,
        data: task,
    }))
}
