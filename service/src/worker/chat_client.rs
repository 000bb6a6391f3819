//! The external chat-platform SDK, as seen by the worker pool: a single
//! `send(recipient, payload) -> Result<()>` capability. Everything SDK-specific is kept
//! behind this thin adapter so the pool logic in `pool.rs` stays platform-agnostic.

use async_trait::async_trait;
use goblast_core::{Content, MessageType};
use serde::Serialize;

/// Tagged payload variant sent to the chat platform, one branch per `MessageType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Payload {
    Text { text: String },
    Media { media: MediaRef, caption: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MediaRef {
    Id(String),
    Url(String),
}

/// Build the SDK payload for a piece of content, preferring `media_id` over
/// `media_url` when both are present, per the per-tenant worker pool's send contract.
pub fn build_payload(content: &Content) -> Result<Payload, String> {
    match content.content_type {
        MessageType::Text => Ok(Payload::Text {
            text: content.text.clone(),
        }),
        _ => {
            let media = if !content.media_id.is_empty() {
                MediaRef::Id(content.media_id.clone())
            } else if !content.media_url.is_empty() {
                MediaRef::Url(content.media_url.clone())
            } else {
                return Err("no media".to_string());
            };
            Ok(Payload::Media {
                media,
                caption: content.caption.clone(),
            })
        }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send(&self, bot_token: &str, recipient: i64, payload: &Payload) -> Result<(), String>;
}

/// Reqwest-backed `ChatClient` calling a chat-platform-compatible HTTP API.
#[derive(Clone)]
pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpChatClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn send(&self, bot_token: &str, recipient: i64, payload: &Payload) -> Result<(), String> {
        let url = format!("{}/bot{}/send", self.base_url, bot_token);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "recipient": recipient, "payload": payload }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !body.is_empty() {
            Err(body)
        } else {
            Err(format!("chat platform returned {status}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_media_id_over_media_url() {
        let content = Content {
            content_type: MessageType::Photo,
            text: String::new(),
            media_url: "https://example.com/a.jpg".to_string(),
            media_id: "abc123".to_string(),
            caption: String::new(),
        };
        let payload = build_payload(&content).unwrap();
        match payload {
            Payload::Media { media: MediaRef::Id(id), .. } => assert_eq!(id, "abc123"),
            other => panic!("expected MediaRef::Id, got {other:?}"),
        }
    }

    #[test]
    fn fails_locally_with_no_media() {
        let content = Content {
            content_type: MessageType::Photo,
            text: String::new(),
            media_url: String::new(),
            media_id: String::new(),
            caption: String::new(),
        };
        assert_eq!(build_payload(&content), Err("no media".to_string()));
    }

    #[test]
    fn text_uses_text_field() {
        let content = Content {
            content_type: MessageType::Text,
            text: "hi".to_string(),
            media_url: String::new(),
            media_id: String::new(),
            caption: String::new(),
        };
        match build_payload(&content).unwrap() {
            Payload::Text { text } => assert_eq!(text, "hi"),
            other => panic!("expected Payload::Text, got {other:?}"),
        }
    }
}
