//! Chat message types.
//!
//! Messages are append-only. A message belongs to one work order and is only
//! ever written through a validated chat session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::Attachments;

/// Maximum characters in a text or AI response message.
pub const MAX_TEXT_CHARS: usize = 1000;

/// Default and maximum page sizes for history reads.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Message content, tagged by `type`.
///
/// Serialized as `{"type": "text", "content": "..."}` or
/// `{"type": "image", "content": {"images": [...]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum MessageBody {
    Text(String),
    Image { images: Vec<String> },
    AiResponse(String),
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Text(_) => "text",
            MessageBody::Image { .. } => "image",
            MessageBody::AiResponse(_) => "ai_response",
        }
    }
}

/// Token accounting attached to AI responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
}

/// A stored chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub work_order_id: i64,
    /// `None` for AI-origin messages.
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub body: MessageBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    pub created_at: DateTime<Utc>,
}

impl Attachments for Message {
    fn entity_id(&self) -> i64 {
        self.id
    }

    fn attachment_refs(&self) -> Vec<String> {
        match &self.body {
            MessageBody::Image { images } => images.clone(),
            _ => Vec::new(),
        }
    }

    fn attachment_slots(&mut self) -> Vec<&mut String> {
        match &mut self.body {
            MessageBody::Image { images } => images.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

/// Insert payload for a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub work_order_id: i64,
    pub user_id: Option<i64>,
    pub body: MessageBody,
    pub metadata: Option<MessageMetadata>,
}

/// One page of history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

/// Trim and bound text content.
pub fn validate_text(content: &str) -> Result<String, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("message content must not be empty".to_string());
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(format!(
            "message content exceeds {MAX_TEXT_CHARS} characters"
        ));
    }
    Ok(trimmed.to_string())
}

/// Resolve `page`/`limit` query values into `(page, limit, offset)`.
pub fn page_window(page: Option<u32>, limit: Option<u32>) -> Result<(u32, u32, i64), String> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if page < 1 {
        return Err("page must be at least 1".to_string());
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(format!("limit must be between 1 and {MAX_PAGE_LIMIT}"));
    }
    let offset = (i64::from(page) - 1) * i64::from(limit);
    Ok((page, limit, offset))
}
