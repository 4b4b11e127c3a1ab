//! Session guard: the per-request admission policy for chat operations.
//!
//! Each operation declares an ordered list of steps. Steps run in order and
//! the first rejection is final. Only the last step of the message operations
//! mutates the store (sliding the TTL), so a rejected request never extends
//! a session.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use workdesk_types::error::SessionError;
use workdesk_types::identity::Caller;
use workdesk_types::session::ChatSession;

use crate::repository::work_order::WorkOrderRepository;
use crate::session::store::SessionStore;

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Chat operations the guard admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOperation {
    Start,
    SendMessage,
    ReadHistory,
    Close,
}

/// One admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStep {
    /// Work order exists and the caller owns it (or is an admin).
    WorkOrderOwnership,
    /// No live session holds the work order.
    NoActiveSession,
    /// The request carries a session id.
    SessionHeaderPresent,
    /// The session exists and has not expired.
    SessionLive,
    /// The session was started by the caller.
    SessionOwner,
    /// The session belongs to the requested work order.
    SessionWorkOrder,
    /// Reset the session TTL.
    SlideExpiry,
}

impl ChatOperation {
    pub fn steps(self) -> &'static [GuardStep] {
        use GuardStep::*;
        match self {
            ChatOperation::Start => &[WorkOrderOwnership, NoActiveSession],
            ChatOperation::SendMessage | ChatOperation::ReadHistory => &[
                SessionHeaderPresent,
                SessionLive,
                SessionOwner,
                SessionWorkOrder,
                SlideExpiry,
            ],
            ChatOperation::Close => &[
                SessionHeaderPresent,
                SessionLive,
                SessionOwner,
                SessionWorkOrder,
            ],
        }
    }
}

/// Inputs to one admission decision.
#[derive(Debug, Clone, Copy)]
pub struct GuardRequest<'a> {
    pub caller: Caller,
    pub work_order_id: i64,
    pub session_id: Option<&'a str>,
    pub operation: ChatOperation,
}

/// Outcome of an admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A new session may be created for the work order.
    Start,
    /// The request runs under this validated session.
    Session(ChatSession),
}

/// Stateless admission policy over the session store and work orders.
pub struct SessionGuard<S: SessionStore, W: WorkOrderRepository> {
    store: Arc<S>,
    work_orders: Arc<W>,
    ttl: Duration,
}

impl<S: SessionStore, W: WorkOrderRepository> SessionGuard<S, W> {
    pub fn new(store: Arc<S>, work_orders: Arc<W>, ttl: Duration) -> Self {
        Self {
            store,
            work_orders,
            ttl,
        }
    }

    /// Run the operation's steps in order.
    pub async fn admit(&self, request: GuardRequest<'_>) -> Result<Admission, SessionError> {
        let work_order_id = request.work_order_id;
        let mut session: Option<ChatSession> = None;

        for step in request.operation.steps() {
            match step {
                GuardStep::WorkOrderOwnership => {
                    let work_order = self
                        .work_orders
                        .get(work_order_id)
                        .await
                        .map_err(|e| SessionError::Storage(e.to_string()))?
                        .ok_or(SessionError::WorkOrderNotFound(work_order_id))?;
                    if !request.caller.can_access(work_order.owner_user_id) {
                        return Err(SessionError::Forbidden(work_order_id));
                    }
                }
                GuardStep::NoActiveSession => {
                    if self.store.exists_for_work_order(work_order_id).await? {
                        return Err(SessionError::Conflict(work_order_id));
                    }
                }
                GuardStep::SessionHeaderPresent => {
                    header(request.session_id)?;
                }
                GuardStep::SessionLive => {
                    let session_id = header(request.session_id)?;
                    session = Some(self.store.get(session_id).await?);
                }
                GuardStep::SessionOwner => {
                    if live(&session)?.user_id != request.caller.user_id {
                        return Err(SessionError::Unauthorized(
                            "chat session belongs to another user".to_string(),
                        ));
                    }
                }
                GuardStep::SessionWorkOrder => {
                    if live(&session)?.work_order_id != work_order_id {
                        return Err(SessionError::Unauthorized(
                            "chat session does not belong to this work order".to_string(),
                        ));
                    }
                }
                GuardStep::SlideExpiry => {
                    let session_id = &live(&session)?.session_id;
                    self.store.refresh(session_id, self.ttl).await?;
                }
            }
            debug!(?step, work_order_id, operation = ?request.operation, "guard step passed");
        }

        Ok(match session {
            Some(session) => Admission::Session(session),
            None => Admission::Start,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn header(session_id: Option<&str>) -> Result<&str, SessionError> {
    session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SessionError::Unauthorized(format!("missing {SESSION_HEADER} header")))
}

fn live(session: &Option<ChatSession>) -> Result<&ChatSession, SessionError> {
    session.as_ref().ok_or(SessionError::Expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use workdesk_types::work_order::WorkOrder;

    use crate::test_support::{FakeTable, MemorySessions, work_order_draft};

    const TTL: Duration = Duration::from_secs(1800);

    struct Fixture {
        guard: SessionGuard<MemorySessions, FakeTable<WorkOrder>>,
        store: Arc<MemorySessions>,
        work_orders: Arc<FakeTable<WorkOrder>>,
    }

    fn fixture() -> Fixture {
        let store = MemorySessions::new();
        let work_orders = FakeTable::<WorkOrder>::new();
        Fixture {
            guard: SessionGuard::new(Arc::clone(&store), Arc::clone(&work_orders), TTL),
            store,
            work_orders,
        }
    }

    fn session(id: &str, work_order_id: i64, user_id: i64) -> ChatSession {
        ChatSession {
            session_id: id.to_string(),
            work_order_id,
            user_id,
            created_at: Utc::now(),
            ttl_seconds: TTL.as_secs(),
        }
    }

    fn request(
        caller: Caller,
        work_order_id: i64,
        session_id: Option<&str>,
        operation: ChatOperation,
    ) -> GuardRequest<'_> {
        GuardRequest {
            caller,
            work_order_id,
            session_id,
            operation,
        }
    }

    #[test]
    fn test_slide_expiry_is_last_step() {
        for op in [ChatOperation::SendMessage, ChatOperation::ReadHistory] {
            assert_eq!(op.steps().last(), Some(&GuardStep::SlideExpiry));
        }
        assert!(!ChatOperation::Close.steps().contains(&GuardStep::SlideExpiry));
    }

    #[tokio::test]
    async fn test_start_admitted_for_owner() {
        let f = fixture();
        let wo = f.work_orders.seed(work_order_draft(7));
        let admission = f
            .guard
            .admit(request(Caller::user(7), wo.id, None, ChatOperation::Start))
            .await
            .unwrap();
        assert_eq!(admission, Admission::Start);
    }

    #[tokio::test]
    async fn test_start_rejects_missing_and_foreign_work_orders() {
        let f = fixture();
        let wo = f.work_orders.seed(work_order_draft(7));

        let err = f
            .guard
            .admit(request(Caller::user(7), 999, None, ChatOperation::Start))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WorkOrderNotFound(999)));

        let err = f
            .guard
            .admit(request(Caller::user(8), wo.id, None, ChatOperation::Start))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Forbidden(_)));

        // Admins may start on any work order.
        assert!(
            f.guard
                .admit(request(Caller::admin(1), wo.id, None, ChatOperation::Start))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_start_conflicts_with_live_session() {
        let f = fixture();
        let wo = f.work_orders.seed(work_order_draft(7));
        f.store.create(&session("s1", wo.id, 7), TTL).await.unwrap();

        let err = f
            .guard
            .admit(request(Caller::user(7), wo.id, None, ChatOperation::Start))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Conflict(id) if id == wo.id));
    }

    #[tokio::test]
    async fn test_message_rejections_in_order() {
        let f = fixture();
        f.store.create(&session("s1", 5, 7), TTL).await.unwrap();
        let op = ChatOperation::SendMessage;

        let err = f.guard.admit(request(Caller::user(7), 5, None, op)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized(_)));

        let err = f
            .guard
            .admit(request(Caller::user(7), 5, Some("   "), op))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized(_)));

        let err = f
            .guard
            .admit(request(Caller::user(7), 5, Some("nope"), op))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Expired));

        let err = f
            .guard
            .admit(request(Caller::user(8), 5, Some("s1"), op))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized(_)));

        let err = f
            .guard
            .admit(request(Caller::user(7), 6, Some("s1"), op))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized(_)));

        let admission = f
            .guard
            .admit(request(Caller::user(7), 5, Some("s1"), op))
            .await
            .unwrap();
        assert_eq!(admission, Admission::Session(f.store.get("s1").await.unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admitted_message_slides_expiry() {
        let f = fixture();
        f.store.create(&session("s1", 5, 7), TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(1500)).await;
        f.guard
            .admit(request(Caller::user(7), 5, Some("s1"), ChatOperation::SendMessage))
            .await
            .unwrap();

        // Past the original deadline, inside the refreshed one.
        tokio::time::advance(Duration::from_secs(1000)).await;
        assert!(f.store.get("s1").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_request_does_not_slide_expiry() {
        let f = fixture();
        f.store.create(&session("s1", 5, 7), TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(1500)).await;
        let _ = f
            .guard
            .admit(request(Caller::user(7), 6, Some("s1"), ChatOperation::SendMessage))
            .await;

        tokio::time::advance(Duration::from_secs(400)).await;
        assert!(f.store.get("s1").await.is_err());
    }

    #[tokio::test]
    async fn test_close_admits_session_owner() {
        let f = fixture();
        f.store.create(&session("s1", 5, 7), TTL).await.unwrap();
        let admission = f
            .guard
            .admit(request(Caller::user(7), 5, Some("s1"), ChatOperation::Close))
            .await
            .unwrap();
        assert!(matches!(admission, Admission::Session(s) if s.session_id == "s1"));
    }
}
