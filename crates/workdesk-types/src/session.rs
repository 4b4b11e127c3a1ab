//! Chat session payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ephemeral chat session state.
///
/// Immutable once created: refresh only extends the TTL in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub work_order_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

/// Response body for a started session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: String,
    pub work_order_id: i64,
    pub expires_in_seconds: u64,
}

impl From<&ChatSession> for SessionStarted {
    fn from(session: &ChatSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            work_order_id: session.work_order_id,
            expires_in_seconds: session.ttl_seconds,
        }
    }
}
