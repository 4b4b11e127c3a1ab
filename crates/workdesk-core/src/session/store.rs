//! Session store trait.
//!
//! An ephemeral key-value store with per-key TTL holding chat sessions,
//! plus a secondary `work_order_id -> session_id` index maintained
//! atomically with create and delete.

use std::time::Duration;

use workdesk_types::error::SessionStoreError;
use workdesk_types::session::ChatSession;

/// Trait for chat session storage.
///
/// Implementations live in workdesk-infra (e.g., `MemorySessionStore`).
pub trait SessionStore: Send + Sync {
    /// Insert a session if its id is absent and its work order has no live
    /// session, as one atomic operation.
    ///
    /// Fails `AlreadyExists` on a duplicate id and `WorkOrderInSession` when
    /// the work order index entry is held by a live session.
    fn create(
        &self,
        session: &ChatSession,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), SessionStoreError>> + Send;

    /// `NotFound` if absent or expired.
    fn get(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<ChatSession, SessionStoreError>> + Send;

    /// Reset the remaining TTL without touching the payload.
    fn refresh(
        &self,
        session_id: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), SessionStoreError>> + Send;

    /// Remove the session and release its index entry. Idempotent.
    fn delete(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<(), SessionStoreError>> + Send;

    /// Remove whichever session holds the work order's index entry. Used when
    /// the work order itself is deleted. Idempotent.
    fn release_work_order(
        &self,
        work_order_id: i64,
    ) -> impl std::future::Future<Output = Result<(), SessionStoreError>> + Send;

    /// Answered from the secondary index, never by scanning keys.
    fn exists_for_work_order(
        &self,
        work_order_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, SessionStoreError>> + Send;

    /// Drop expired entries from memory. Returns how many were removed.
    fn purge_expired(
        &self,
    ) -> impl std::future::Future<Output = Result<usize, SessionStoreError>> + Send;
}
