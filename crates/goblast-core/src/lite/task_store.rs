//! Postgres-backed task store (C3): persist task records, update terminal status + stats.

use crate::{MessageType, Priority, Result, Stats, Task, TaskStatus, TaskStore};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert_scheduled(
        &self,
        id: Uuid,
        tenant_id: i64,
        message_type: MessageType,
        content_json: serde_json::Value,
        priority: Priority,
        schedule: Option<DateTime<Utc>>,
    ) -> Result<Task> {
        let row = sqlx::query(
            r#"
            INSERT INTO tasks
                (id, user_id, message_type, content, priority, schedule, status, created_at, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, 'scheduled', now(), now())
            RETURNING id, user_id, message_type, content, priority, schedule, status,
                      created_at, updated_at, stats, deleted_at
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(message_type.as_str())
        .bind(&content_json)
        .bind(priority_str(priority))
        .bind(schedule)
        .fetch_one(&self.pool)
        .await
        .context("insert tasks")?;

        row_to_task(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, message_type, content, priority, schedule, status,
                   created_at, updated_at, stats, deleted_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select tasks by id")?;

        row.map(row_to_task).transpose()
    }

    async fn update_status_and_stats(&self, id: Uuid, status: TaskStatus, stats: &Stats) -> Result<()> {
        let stats_json = serde_json::to_value(stats).context("serialize stats")?;
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, stats = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status_str(status))
        .bind(stats_json)
        .execute(&self.pool)
        .await
        .context("update task status and stats")?;

        Ok(())
    }
}

fn priority_str(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "high",
        Priority::Medium => "medium",
        Priority::Low => "low",
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Scheduled => "scheduled",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Complete => "complete",
        TaskStatus::Failed => "failed",
    }
}

fn row_to_task(row: sqlx::postgres::PgRow) -> Result<Task> {
    let message_type: String = row.try_get("message_type").context("message_type")?;
    let priority: String = row.try_get("priority").context("priority")?;
    let status: String = row.try_get("status").context("status")?;

    Ok(Task {
        id: row.try_get("id").context("id")?,
        tenant_id: row.try_get("user_id").context("user_id")?,
        message_type: parse_message_type(&message_type)?,
        content_json: row.try_get("content").context("content")?,
        priority: parse_priority(&priority),
        schedule: row.try_get("schedule").context("schedule")?,
        status: parse_status(&status)?,
        created_at: row.try_get("created_at").context("created_at")?,
        updated_at: row.try_get("updated_at").context("updated_at")?,
        stats_json: row.try_get("stats").context("stats")?,
        deleted_at: row.try_get("deleted_at").context("deleted_at")?,
    })
}

fn parse_message_type(value: &str) -> Result<MessageType> {
    Ok(match value {
        "text" => MessageType::Text,
        "photo" => MessageType::Photo,
        "video" => MessageType::Video,
        "animation" => MessageType::Animation,
        "document" => MessageType::Document,
        "audio" => MessageType::Audio,
        "circle" => MessageType::Circle,
        other => return Err(crate::Error::msg(format!("unknown message_type '{other}'"))),
    })
}

fn parse_priority(value: &str) -> Priority {
    match value {
        "high" => Priority::High,
        "low" => Priority::Low,
        _ => Priority::Medium,
    }
}

fn parse_status(value: &str) -> Result<TaskStatus> {
    Ok(match value {
        "scheduled" => TaskStatus::Scheduled,
        "in_progress" => TaskStatus::InProgress,
        "complete" => TaskStatus::Complete,
        "failed" => TaskStatus::Failed,
        other => return Err(crate::Error::msg(format!("unknown task status '{other}'"))),
    })
}
