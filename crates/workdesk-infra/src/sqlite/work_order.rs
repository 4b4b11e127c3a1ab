//! SQLite work order repository implementation.
//!
//! Implements `WorkOrderRepository` and the transactional resource traits from
//! `workdesk-core` using sqlx with split read/write pools. Attachments are
//! stored as a JSON array of blob references.

use chrono::NaiveDate;
use sqlx::Row;
use workdesk_core::repository::resource::{
    AttachmentMode, PatchTx, RemovableResource, ResourceTx, TransactionalResource,
};
use workdesk_core::repository::work_order::WorkOrderRepository;
use workdesk_types::error::RepositoryError;
use workdesk_types::work_order::{NewWorkOrder, WorkOrder, WorkOrderPatch, WorkOrderStatus};

use super::message::image_refs;
use super::pool::{DatabasePool, now, parse_datetime, query_error};
use super::tx::SqliteTx;

/// SQLite-backed implementation of `WorkOrderRepository`.
pub struct SqliteWorkOrderRepository {
    pool: DatabasePool,
}

impl SqliteWorkOrderRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain WorkOrder.
struct WorkOrderRow {
    id: i64,
    description: String,
    location: Option<String>,
    status: String,
    scheduled_date: Option<String>,
    owner_user_id: i64,
    attachments: String,
    created_at: String,
    updated_at: String,
}

impl WorkOrderRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            description: row.try_get("description")?,
            location: row.try_get("location")?,
            status: row.try_get("status")?,
            scheduled_date: row.try_get("scheduled_date")?,
            owner_user_id: row.try_get("owner_user_id")?,
            attachments: row.try_get("attachments")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_work_order(self) -> Result<WorkOrder, RepositoryError> {
        let status: WorkOrderStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        let scheduled_date = self
            .scheduled_date
            .as_deref()
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|e| RepositoryError::Query(format!("invalid scheduled_date: {e}")))
            })
            .transpose()?;

        let attachments = parse_refs(&self.attachments)?;

        Ok(WorkOrder {
            id: self.id,
            description: self.description,
            location: self.location,
            status,
            scheduled_date,
            owner_user_id: self.owner_user_id,
            attachments,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_refs(json: &str) -> Result<Vec<String>, RepositoryError> {
    serde_json::from_str(json)
        .map_err(|e| RepositoryError::Query(format!("invalid attachments JSON: {e}")))
}

fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<WorkOrder, RepositoryError> {
    WorkOrderRow::from_row(row)
        .map_err(query_error)?
        .into_work_order()
}

fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl WorkOrderRepository for SqliteWorkOrderRepository {
    async fn get(&self, id: i64) -> Result<Option<WorkOrder>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM work_orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_row).transpose()
    }

    async fn list(&self, owner_user_id: Option<i64>) -> Result<Vec<WorkOrder>, RepositoryError> {
        let rows = match owner_user_id {
            Some(owner) => {
                sqlx::query("SELECT * FROM work_orders WHERE owner_user_id = ? ORDER BY id DESC")
                    .bind(owner)
                    .fetch_all(&self.pool.reader)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM work_orders ORDER BY id DESC")
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(query_error)?;

        rows.iter().map(map_row).collect()
    }
}

impl ResourceTx for SqliteTx<WorkOrder> {
    type Entity = WorkOrder;
    type Draft = NewWorkOrder;

    async fn insert(&mut self, draft: NewWorkOrder) -> Result<i64, RepositoryError> {
        let now = now();
        let result = sqlx::query(
            "INSERT INTO work_orders (description, location, status, scheduled_date, owner_user_id, attachments, created_at, updated_at)
             VALUES (?, ?, 'draft', ?, ?, '[]', ?, ?)",
        )
        .bind(&draft.description)
        .bind(&draft.location)
        .bind(draft.scheduled_date.as_ref().map(format_date))
        .bind(draft.owner_user_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn fetch(&mut self, id: i64) -> Result<Option<WorkOrder>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM work_orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_row).transpose()
    }

    async fn set_attachments(&mut self, id: i64, refs: &[String]) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(refs).map_err(|e| RepositoryError::Query(e.to_string()))?;
        let result = sqlx::query("UPDATE work_orders SET attachments = ?, updated_at = ? WHERE id = ?")
            .bind(&json)
            .bind(now())
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

impl PatchTx for SqliteTx<WorkOrder> {
    type Patch = WorkOrderPatch;

    async fn apply(&mut self, id: i64, patch: WorkOrderPatch) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE work_orders SET
                description = COALESCE(?, description),
                location = COALESCE(?, location),
                status = COALESCE(?, status),
                scheduled_date = COALESCE(?, scheduled_date),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&patch.description)
        .bind(&patch.location)
        .bind(patch.status.map(|s| s.to_string()))
        .bind(patch.scheduled_date.as_ref().map(format_date))
        .bind(now())
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

impl TransactionalResource for SqliteWorkOrderRepository {
    type Tx = SqliteTx<WorkOrder>;
    const KIND: &'static str = "work-orders";
    const NOUN: &'static str = "work order";
    const MODE: AttachmentMode = AttachmentMode::Append;

    async fn begin(&self) -> Result<SqliteTx<WorkOrder>, RepositoryError> {
        SqliteTx::begin(&self.pool).await
    }

    async fn find(&self, id: i64) -> Result<Option<WorkOrder>, RepositoryError> {
        self.get(id).await
    }
}

impl RemovableResource for SqliteWorkOrderRepository {
    /// Deletes the work order; estimates and messages cascade. Returns the
    /// references held by the work order, its estimates and its image
    /// messages.
    async fn remove(&self, id: i64) -> Result<Vec<String>, RepositoryError> {
        let mut tx = SqliteTx::<WorkOrder>::begin(&self.pool).await?;

        let attachments: Option<String> =
            sqlx::query_scalar("SELECT attachments FROM work_orders WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx.tx)
                .await
                .map_err(query_error)?;
        let Some(attachments) = attachments else {
            tx.rollback_inner().await?;
            return Err(RepositoryError::NotFound);
        };
        let mut released = parse_refs(&attachments)?;

        let estimate_refs: Vec<String> = sqlx::query_scalar(
            "SELECT attachment FROM estimates WHERE work_order_id = ? AND attachment IS NOT NULL ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx.tx)
        .await
        .map_err(query_error)?;
        released.extend(estimate_refs);

        let bodies: Vec<String> =
            sqlx::query_scalar("SELECT message FROM messages WHERE work_order_id = ? ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx.tx)
                .await
                .map_err(query_error)?;
        for body in &bodies {
            released.extend(image_refs(body)?);
        }

        sqlx::query("DELETE FROM work_orders WHERE id = ?")
            .bind(id)
            .execute(&mut *tx.tx)
            .await
            .map_err(query_error)?;

        tx.commit_inner().await?;
        Ok(released)
    }
}
