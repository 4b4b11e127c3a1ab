//! SQLite estimate repository implementation.

use sqlx::Row;
use workdesk_core::repository::estimate::EstimateRepository;
use workdesk_core::repository::resource::{
    AttachmentMode, PatchTx, RemovableResource, ResourceTx, TransactionalResource,
};
use workdesk_types::error::RepositoryError;
use workdesk_types::estimate::{Estimate, EstimateFilter, EstimatePatch, NewEstimate};

use super::pool::{DatabasePool, now, parse_datetime, query_error};
use super::tx::SqliteTx;

/// SQLite-backed implementation of `EstimateRepository`.
pub struct SqliteEstimateRepository {
    pool: DatabasePool,
}

impl SqliteEstimateRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct EstimateRow {
    id: i64,
    work_order_id: i64,
    vendor_id: i64,
    cost: f64,
    attachment: Option<String>,
    created_at: String,
    updated_at: String,
}

impl EstimateRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            work_order_id: row.try_get("work_order_id")?,
            vendor_id: row.try_get("vendor_id")?,
            cost: row.try_get("cost")?,
            attachment: row.try_get("attachment")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_estimate(self) -> Result<Estimate, RepositoryError> {
        Ok(Estimate {
            id: self.id,
            work_order_id: self.work_order_id,
            vendor_id: self.vendor_id,
            cost: self.cost,
            attachment: self.attachment,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<Estimate, RepositoryError> {
    EstimateRow::from_row(row).map_err(query_error)?.into_estimate()
}

impl EstimateRepository for SqliteEstimateRepository {
    async fn get(&self, id: i64) -> Result<Option<Estimate>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM estimates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_row).transpose()
    }

    async fn list(&self, filter: &EstimateFilter) -> Result<Vec<Estimate>, RepositoryError> {
        let mut sql = String::from(
            "SELECT e.* FROM estimates e JOIN work_orders w ON w.id = e.work_order_id",
        );
        let mut conditions: Vec<&str> = Vec::new();
        let mut binds: Vec<i64> = Vec::new();

        if let Some(work_order_id) = filter.work_order_id {
            conditions.push("e.work_order_id = ?");
            binds.push(work_order_id);
        }
        if let Some(vendor_id) = filter.vendor_id {
            conditions.push("e.vendor_id = ?");
            binds.push(vendor_id);
        }
        if let Some(owner) = filter.owner_user_id {
            conditions.push("w.owner_user_id = ?");
            binds.push(owner);
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY e.id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            binds.push(limit);
        }

        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter().map(map_row).collect()
    }
}

impl ResourceTx for SqliteTx<Estimate> {
    type Entity = Estimate;
    type Draft = NewEstimate;

    async fn insert(&mut self, draft: NewEstimate) -> Result<i64, RepositoryError> {
        let now = now();
        let result = sqlx::query(
            "INSERT INTO estimates (work_order_id, vendor_id, cost, attachment, created_at, updated_at)
             VALUES (?, ?, ?, NULL, ?, ?)",
        )
        .bind(draft.work_order_id)
        .bind(draft.vendor_id)
        .bind(draft.cost)
        .bind(&now)
        .bind(&now)
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

    async fn fetch(&mut self, id: i64) -> Result<Option<Estimate>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM estimates WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_row).transpose()
    }

    async fn set_attachments(&mut self, id: i64, refs: &[String]) -> Result<(), RepositoryError> {
        if refs.len() > 1 {
            return Err(RepositoryError::Conflict(format!(
                "estimate {id} holds at most one attachment"
            )));
        }
        let result = sqlx::query("UPDATE estimates SET attachment = ?, updated_at = ? WHERE id = ?")
            .bind(refs.first().cloned())
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

impl PatchTx for SqliteTx<Estimate> {
    type Patch = EstimatePatch;

    async fn apply(&mut self, id: i64, patch: EstimatePatch) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE estimates SET
                vendor_id = COALESCE(?, vendor_id),
                cost = COALESCE(?, cost),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(patch.vendor_id)
        .bind(patch.cost)
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

impl TransactionalResource for SqliteEstimateRepository {
    type Tx = SqliteTx<Estimate>;
    const KIND: &'static str = "estimates";
    const NOUN: &'static str = "estimate";
    const MODE: AttachmentMode = AttachmentMode::ReplaceSingle;

    async fn begin(&self) -> Result<SqliteTx<Estimate>, RepositoryError> {
        SqliteTx::begin(&self.pool).await
    }

    async fn find(&self, id: i64) -> Result<Option<Estimate>, RepositoryError> {
        self.get(id).await
    }
}

impl RemovableResource for SqliteEstimateRepository {
    async fn remove(&self, id: i64) -> Result<Vec<String>, RepositoryError> {
        let mut tx = SqliteTx::<Estimate>::begin(&self.pool).await?;

        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT attachment FROM estimates WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx.tx)
                .await
                .map_err(query_error)?;
        let Some((attachment,)) = row else {
            tx.rollback_inner().await?;
            return Err(RepositoryError::NotFound);
        };

        sqlx::query("DELETE FROM estimates WHERE id = ?")
            .bind(id)
            .execute(&mut *tx.tx)
            .await
            .map_err(query_error)?;

        tx.commit_inner().await?;
        Ok(attachment.into_iter().collect())
    }
}
