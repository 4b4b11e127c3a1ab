//! SQLite chat message repository implementation.
//!
//! The message body is stored as JSON (`{"type": ..., "content": ...}`) so
//! image messages keep their reference list in the same column as text.

use sqlx::Row;
use workdesk_core::repository::message::MessageRepository;
use workdesk_core::repository::resource::{AttachmentMode, ResourceTx, TransactionalResource};
use workdesk_types::error::RepositoryError;
use workdesk_types::message::{Message, MessageBody, MessageMetadata, NewMessage};

use super::pool::{DatabasePool, now, parse_datetime, query_error};
use super::tx::SqliteTx;

/// SQLite-backed implementation of `MessageRepository`.
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct MessageRow {
    id: i64,
    work_order_id: i64,
    user_id: Option<i64>,
    message: String,
    metadata: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            work_order_id: row.try_get("work_order_id")?,
            user_id: row.try_get("user_id")?,
            message: row.try_get("message")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let body: MessageBody = serde_json::from_str(&self.message)
            .map_err(|e| RepositoryError::Query(format!("invalid message JSON: {e}")))?;
        let metadata: Option<MessageMetadata> = self
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;

        Ok(Message {
            id: self.id,
            work_order_id: self.work_order_id,
            user_id: self.user_id,
            body,
            metadata,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<Message, RepositoryError> {
    MessageRow::from_row(row).map_err(query_error)?.into_message()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Query(e.to_string()))
}

/// Blob references held by a stored message body.
pub(crate) fn image_refs(json: &str) -> Result<Vec<String>, RepositoryError> {
    let body: MessageBody = serde_json::from_str(json)
        .map_err(|e| RepositoryError::Query(format!("invalid message JSON: {e}")))?;
    Ok(match body {
        MessageBody::Image { images } => images,
        _ => Vec::new(),
    })
}

impl MessageRepository for SqliteMessageRepository {
    async fn page(
        &self,
        work_order_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64), RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE work_order_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(work_order_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE work_order_id = ?")
            .bind(work_order_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let messages = rows.iter().map(map_row).collect::<Result<Vec<_>, _>>()?;
        Ok((messages, total))
    }
}

impl ResourceTx for SqliteTx<Message> {
    type Entity = Message;
    type Draft = NewMessage;

    async fn insert(&mut self, draft: NewMessage) -> Result<i64, RepositoryError> {
        let body = to_json(&draft.body)?;
        let metadata = draft.metadata.as_ref().map(to_json).transpose()?;

        let result = sqlx::query(
            "INSERT INTO messages (work_order_id, user_id, message, metadata, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(draft.work_order_id)
        .bind(draft.user_id)
        .bind(&body)
        .bind(&metadata)
        .bind(now())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                Err(RepositoryError::NotFound)
            }
            Err(e) => Err(query_error(e)),
        }
    }

    async fn fetch(&mut self, id: i64) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_row).transpose()
    }

    /// Rewrites the body as an image message holding `refs`.
    async fn set_attachments(&mut self, id: i64, refs: &[String]) -> Result<(), RepositoryError> {
        let body = to_json(&MessageBody::Image {
            images: refs.to_vec(),
        })?;
        let result = sqlx::query("UPDATE messages SET message = ? WHERE id = ?")
            .bind(&body)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.commit_inner().await
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.rollback_inner().await
    }
}

impl TransactionalResource for SqliteMessageRepository {
    type Tx = SqliteTx<Message>;
    const KIND: &'static str = "messages";
    const NOUN: &'static str = "message";
    const MODE: AttachmentMode = AttachmentMode::Append;

    async fn begin(&self) -> Result<SqliteTx<Message>, RepositoryError> {
        SqliteTx::begin(&self.pool).await
    }

    async fn find(&self, id: i64) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_row).transpose()
    }
}
