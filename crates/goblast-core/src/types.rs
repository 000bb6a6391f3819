//! Domain types shared across the submission gateway, dispatch subscriber and worker pools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Photo,
    Video,
    Animation,
    Document,
    Audio,
    Circle,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Photo => "photo",
            MessageType::Video => "video",
            MessageType::Animation => "animation",
            MessageType::Document => "document",
            MessageType::Audio => "audio",
            MessageType::Circle => "circle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Scheduled,
    InProgress,
    Complete,
    Failed,
}

/// A message or media broadcast payload, as submitted by the caller.
///
/// Invariant (validated at the submission boundary, not here): `type=text` requires
/// non-empty `text`; media types require `media_url` or `media_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub content_type: MessageType,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media_url: String,
    #[serde(default)]
    pub media_id: String,
    #[serde(default)]
    pub caption: String,
}

impl Content {
    /// Validate the invariants from the data model: text content needs text, media
    /// content needs a media reference. Returns a caller-facing message on failure.
    pub fn validate(&self) -> Result<(), String> {
        match self.content_type {
            MessageType::Text => {
                if self.text.is_empty() {
                    return Err("text is required for type 'text'".to_string());
                }
            }
            other => {
                if self.media_url.is_empty() && self.media_id.is_empty() {
                    return Err(format!(
                        "media_url is required for type '{}'",
                        other.as_str()
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: i64,
    pub message_type: MessageType,
    pub content_json: serde_json::Value,
    pub priority: Priority,
    pub schedule: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stats_json: Option<serde_json::Value>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Wire payload published on `tasks.create`, consumed by the dispatch subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub task_id: Uuid,
    pub tenant_id: i64,
    pub recipients: Vec<i64>,
    pub content: Content,
    pub priority: Priority,
}

impl DispatchMessage {
    /// `task_id != nil, tenant_id != 0, |recipients| > 0, content.type != ""` — the
    /// validation the dispatch subscriber runs before handing the message to C7.
    pub fn validate(&self) -> Result<(), String> {
        if self.task_id.is_nil() {
            return Err("task_id is required".to_string());
        }
        if self.tenant_id == 0 {
            return Err("tenant_id is required".to_string());
        }
        if self.recipients.is_empty() {
            return Err("recipients must be non-empty".to_string());
        }
        Ok(())
    }
}

/// In-memory unit of work inside a worker pool: one (task, recipient) pair.
#[derive(Debug, Clone)]
pub struct TaskItem {
    pub task_id: Uuid,
    pub recipient: i64,
    pub content: Content,
    pub priority: Priority,
}

/// Wire payload published on `tasks.complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub task_id: Uuid,
    pub status: &'static str,
    pub stats: Stats,
}

/// Per-task counters owned by a worker pool until finalize moves them to the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_sent: u64,
    pub total_failed: u64,
    pub processed_count: u64,
    pub expected_count: u64,
    pub by_content_type: HashMap<String, u64>,
    pub error_counts: HashMap<String, u64>,
    pub start_time: Option<DateTime<Utc>>,
    pub time_spent_seconds: f64,
}

impl Stats {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start_time),
            ..Default::default()
        }
    }

    /// `processed_count == expected_count && expected_count > 0` — the completion
    /// predicate guarding a one-shot `finalize`.
    pub fn is_complete(&self) -> bool {
        self.expected_count > 0 && self.processed_count == self.expected_count
    }

    pub fn increment_sent(&mut self, content_type: MessageType) {
        self.total_sent += 1;
        self.processed_count += 1;
        *self
            .by_content_type
            .entry(content_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    pub fn increment_failed(&mut self, kind: &str) {
        self.total_failed += 1;
        self.processed_count += 1;
        *self.error_counts.entry(kind.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: i64,
    pub username: String,
    pub encrypted_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_validation_requires_text_for_text_type() {
        let content = Content {
            content_type: MessageType::Text,
            text: String::new(),
            media_url: String::new(),
            media_id: String::new(),
            caption: String::new(),
        };
        assert!(content.validate().is_err());
    }

    #[test]
    fn content_validation_requires_media_for_media_types() {
        let content = Content {
            content_type: MessageType::Photo,
            text: String::new(),
            media_url: String::new(),
            media_id: String::new(),
            caption: String::new(),
        };
        assert!(content.validate().is_err());

        let with_url = Content {
            media_url: "https://example.com/a.jpg".to_string(),
            ..content
        };
        assert!(with_url.validate().is_ok());
    }

    #[test]
    fn stats_completion_requires_nonzero_expected_count() {
        let stats = Stats::new(Utc::now());
        assert!(!stats.is_complete(), "0/0 must not read as complete");
    }

    #[test]
    fn stats_invariants_hold_across_increments() {
        let mut stats = Stats::new(Utc::now());
        stats.expected_count = 3;

        stats.increment_sent(MessageType::Text);
        stats.increment_failed("NOT_FOUND");
        stats.increment_sent(MessageType::Text);

        assert_eq!(stats.total_sent + stats.total_failed, stats.processed_count);
        assert_eq!(stats.by_content_type.get("text").copied().unwrap_or(0), 2);
        assert_eq!(stats.error_counts.get("NOT_FOUND").copied().unwrap_or(0), 1);
        assert!(stats.is_complete());
    }

    #[test]
    fn dispatch_message_validation_rejects_empty_recipients() {
        let msg = DispatchMessage {
            task_id: Uuid::new_v4(),
            tenant_id: 1,
            recipients: vec![],
            content: Content {
                content_type: MessageType::Text,
                text: "hi".to_string(),
                media_url: String::new(),
                media_id: String::new(),
                caption: String::new(),
            },
            priority: Priority::Medium,
        };
        assert!(msg.validate().is_err());
    }
}
