//! In-process session store backed by two `DashMap`s.
//!
//! `sessions` maps session id to payload and deadline; `by_work_order` is the
//! secondary index enforcing one live session per work order. Operations that
//! touch both maps lock the index shard first, then the session shard, so
//! create and delete are atomic with respect to each other.
//!
//! Expired entries are invisible to every read and are dropped from memory
//! by `purge_expired`.

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::debug;
use workdesk_core::session::store::SessionStore;
use workdesk_types::error::SessionStoreError;
use workdesk_types::session::ChatSession;

#[derive(Debug, Clone)]
struct StoredSession {
    session: ChatSession,
    expires_at: Instant,
}

impl StoredSession {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, StoredSession>,
    by_work_order: DashMap<i64, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held in memory, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn holds_live(&self, session_id: &str, work_order_id: i64, now: Instant) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|s| s.is_live(now) && s.session.work_order_id == work_order_id)
    }
}

impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &ChatSession, ttl: Duration) -> Result<(), SessionStoreError> {
        let now = Instant::now();
        let index = self.by_work_order.entry(session.work_order_id);
        if let Entry::Occupied(holder) = &index {
            if self.holds_live(holder.get(), session.work_order_id, now) {
                return Err(SessionStoreError::WorkOrderInSession(session.work_order_id));
            }
        }

        match self.sessions.entry(session.session_id.clone()) {
            Entry::Occupied(existing) if existing.get().is_live(now) => {
                return Err(SessionStoreError::AlreadyExists);
            }
            Entry::Occupied(mut existing) => {
                existing.insert(StoredSession {
                    session: session.clone(),
                    expires_at: now + ttl,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(StoredSession {
                    session: session.clone(),
                    expires_at: now + ttl,
                });
            }
        }

        index.insert(session.session_id.clone());
        debug!(
            session_id = %session.session_id,
            work_order_id = session.work_order_id,
            ttl_secs = ttl.as_secs(),
            "session created"
        );
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<ChatSession, SessionStoreError> {
        let now = Instant::now();
        self.sessions
            .get(session_id)
            .filter(|s| s.is_live(now))
            .map(|s| s.session.clone())
            .ok_or(SessionStoreError::NotFound)
    }

    async fn refresh(&self, session_id: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        let now = Instant::now();
        match self.sessions.get_mut(session_id) {
            Some(mut stored) if stored.is_live(now) => {
                stored.expires_at = now + ttl;
                Ok(())
            }
            _ => Err(SessionStoreError::NotFound),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError> {
        let Some(work_order_id) = self
            .sessions
            .get(session_id)
            .map(|s| s.session.work_order_id)
        else {
            return Ok(());
        };

        match self.by_work_order.entry(work_order_id) {
            Entry::Occupied(holder) if holder.get() == session_id => {
                self.sessions.remove(session_id);
                holder.remove();
            }
            _ => {
                self.sessions.remove(session_id);
            }
        }
        debug!(session_id, work_order_id, "session deleted");
        Ok(())
    }

    async fn release_work_order(&self, work_order_id: i64) -> Result<(), SessionStoreError> {
        if let Entry::Occupied(holder) = self.by_work_order.entry(work_order_id) {
            let (_, session_id) = holder.remove_entry();
            self.sessions.remove(&session_id);
            debug!(session_id = %session_id, work_order_id, "session released with its work order");
        }
        Ok(())
    }

    async fn exists_for_work_order(&self, work_order_id: i64) -> Result<bool, SessionStoreError> {
        let Some(holder) = self.by_work_order.get(&work_order_id).map(|h| h.value().clone()) else {
            return Ok(false);
        };
        Ok(self.holds_live(&holder, work_order_id, Instant::now()))
    }

    async fn purge_expired(&self) -> Result<usize, SessionStoreError> {
        let now = Instant::now();
        let expired: Vec<(String, i64)> = self
            .sessions
            .iter()
            .filter(|s| !s.is_live(now))
            .map(|s| (s.key().clone(), s.session.work_order_id))
            .collect();

        let mut removed = 0;
        for (session_id, work_order_id) in expired {
            let index = self.by_work_order.entry(work_order_id);
            if self
                .sessions
                .remove_if(&session_id, |_, s| !s.is_live(now))
                .is_none()
            {
                continue;
            }
            removed += 1;
            if let Entry::Occupied(holder) = index {
                if *holder.get() == session_id {
                    holder.remove();
                }
            }
        }

        if removed > 0 {
            debug!(removed, "purged expired sessions");
        }
        Ok(removed)
    }
}
