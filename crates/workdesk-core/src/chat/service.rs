//! Chat service: session lifecycle and message persistence for work orders.
//!
//! Every operation is admitted by the `SessionGuard` first. Messages are
//! written through the transactional writer so image messages get the same
//! upload/compensation discipline as work order attachments.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use workdesk_types::attachment::Upload;
use workdesk_types::error::{ChatError, ResourceError, SessionError};
use workdesk_types::identity::Caller;
use workdesk_types::message::{
    Message, MessageBody, MessageMetadata, MessagePage, NewMessage, page_window, validate_text,
};
use workdesk_types::session::ChatSession;

use crate::repository::message::MessageRepository;
use crate::repository::resource::{ResourceTx, TransactionalResource};
use crate::repository::work_order::WorkOrderRepository;
use crate::resource::signed::SignedAccessResolver;
use crate::resource::writer::TransactionalWriter;
use crate::session::guard::{Admission, ChatOperation, GuardRequest, SessionGuard};
use crate::session::store::SessionStore;
use crate::storage::blob_store::BlobStore;

/// A text or AI response message submitted by the session holder.
#[derive(Debug, Clone)]
pub struct ChatInput {
    pub body: MessageBody,
    pub metadata: Option<MessageMetadata>,
}

/// Orchestrates chat sessions and message persistence.
///
/// Generic over the session store, work order lookup, message table and
/// blob store (workdesk-core never depends on workdesk-infra).
pub struct ChatService<S, W, M, B>
where
    S: SessionStore,
    W: WorkOrderRepository,
    M: MessageRepository + TransactionalResource<Tx: ResourceTx<Entity = Message, Draft = NewMessage>>,
    B: BlobStore + 'static,
{
    guard: SessionGuard<S, W>,
    store: Arc<S>,
    messages: Arc<M>,
    writer: TransactionalWriter<M, B>,
    resolver: Arc<SignedAccessResolver<B>>,
}

impl<S, W, M, B> ChatService<S, W, M, B>
where
    S: SessionStore,
    W: WorkOrderRepository,
    M: MessageRepository + TransactionalResource<Tx: ResourceTx<Entity = Message, Draft = NewMessage>>,
    B: BlobStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        work_orders: Arc<W>,
        writer: TransactionalWriter<M, B>,
        resolver: Arc<SignedAccessResolver<B>>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            guard: SessionGuard::new(Arc::clone(&store), work_orders, session_ttl),
            store,
            messages: Arc::clone(writer.resource()),
            writer,
            resolver,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.guard.ttl()
    }

    /// Start a chat session on a work order the caller owns.
    ///
    /// An existing live session is never displaced; a racing second start
    /// loses at the store's atomic create and gets `Conflict`.
    pub async fn start(&self, caller: Caller, work_order_id: i64) -> Result<ChatSession, ChatError> {
        self.admit(caller, work_order_id, None, ChatOperation::Start)
            .await?;

        let ttl = self.guard.ttl();
        let session = ChatSession {
            session_id: Uuid::new_v4().to_string(),
            work_order_id,
            user_id: caller.user_id,
            created_at: Utc::now(),
            ttl_seconds: ttl.as_secs(),
        };
        self.store
            .create(&session, ttl)
            .await
            .map_err(SessionError::from)?;

        info!(
            work_order_id,
            user_id = caller.user_id,
            session_id = %session.session_id,
            "chat session started"
        );
        Ok(session)
    }

    /// Store a text or AI response message. AI responses carry no user id.
    pub async fn send_message(
        &self,
        caller: Caller,
        work_order_id: i64,
        session_id: Option<&str>,
        input: ChatInput,
        cancel: CancellationToken,
    ) -> Result<Message, ChatError> {
        let (body, user_id) = match input.body {
            MessageBody::Text(content) => (
                MessageBody::Text(validate_text(&content).map_err(ResourceError::Validation)?),
                Some(caller.user_id),
            ),
            MessageBody::AiResponse(content) => (
                MessageBody::AiResponse(
                    validate_text(&content).map_err(ResourceError::Validation)?,
                ),
                None,
            ),
            MessageBody::Image { .. } => {
                return Err(ResourceError::Validation(
                    "image messages are sent as file uploads".to_string(),
                )
                .into());
            }
        };

        self.admit(caller, work_order_id, session_id, ChatOperation::SendMessage)
            .await?;

        let draft = NewMessage {
            work_order_id,
            user_id,
            body,
            metadata: input.metadata,
        };
        let message = self
            .writer
            .create_with_attachments(draft, Vec::new(), cancel)
            .await?;
        Ok(message)
    }

    /// Store an image message. The images are uploaded under the message's
    /// id and the message is only committed once every upload succeeded.
    pub async fn send_images(
        &self,
        caller: Caller,
        work_order_id: i64,
        session_id: Option<&str>,
        files: Vec<Upload>,
        cancel: CancellationToken,
    ) -> Result<Message, ChatError> {
        if files.is_empty() {
            return Err(ResourceError::Validation("at least one image is required".to_string()).into());
        }

        self.admit(caller, work_order_id, session_id, ChatOperation::SendMessage)
            .await?;

        let draft = NewMessage {
            work_order_id,
            user_id: Some(caller.user_id),
            body: MessageBody::Image { images: Vec::new() },
            metadata: None,
        };
        let message = self
            .writer
            .create_with_attachments(draft, files, cancel)
            .await?;
        Ok(self.resolver.sign(message).await?)
    }

    /// One page of history, newest first, with image references signed.
    pub async fn history(
        &self,
        caller: Caller,
        work_order_id: i64,
        session_id: Option<&str>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<MessagePage, ChatError> {
        let (page, limit, offset) = page_window(page, limit).map_err(ResourceError::Validation)?;

        self.admit(caller, work_order_id, session_id, ChatOperation::ReadHistory)
            .await?;

        let (messages, total) = self
            .messages
            .page(work_order_id, offset, i64::from(limit))
            .await
            .map_err(ResourceError::from)?;
        let messages = self.resolver.sign_all(messages).await?;

        Ok(MessagePage {
            messages,
            page,
            limit,
            total,
        })
    }

    /// End a session explicitly, releasing the work order for a new start.
    pub async fn close(
        &self,
        caller: Caller,
        work_order_id: i64,
        session_id: Option<&str>,
    ) -> Result<(), ChatError> {
        let admission = self
            .admit(caller, work_order_id, session_id, ChatOperation::Close)
            .await?;
        if let Admission::Session(session) = admission {
            self.store
                .delete(&session.session_id)
                .await
                .map_err(SessionError::from)?;
            info!(work_order_id, session_id = %session.session_id, "chat session closed");
        }
        Ok(())
    }

    /// Drop the work order's session, if any. Called after the work order is
    /// deleted so a stale session cannot keep writing to it.
    pub async fn release_work_order(&self, work_order_id: i64) -> Result<(), ChatError> {
        self.store
            .release_work_order(work_order_id)
            .await
            .map_err(SessionError::from)?;
        Ok(())
    }

    async fn admit(
        &self,
        caller: Caller,
        work_order_id: i64,
        session_id: Option<&str>,
        operation: ChatOperation,
    ) -> Result<Admission, SessionError> {
        self.guard
            .admit(GuardRequest {
                caller,
                work_order_id,
                session_id,
                operation,
            })
            .await
    }
}
