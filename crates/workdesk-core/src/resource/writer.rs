//! Transactional resource writer.
//!
//! Composes a relational write with zero or more blob uploads. Rows never
//! commit referencing a blob that failed to upload, and blobs uploaded for a
//! write that did not commit are deleted again.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use workdesk_types::attachment::{Attachments, Upload};
use workdesk_types::error::{RepositoryError, ResourceError};

use crate::repository::resource::{
    AttachmentMode, DraftOf, EntityOf, PatchTx, RemovableResource, ResourceTx,
    TransactionalResource,
};
use crate::resource::saga::UploadSaga;
use crate::storage::blob_store::BlobStore;

/// Saga coordinator for one entity table.
pub struct TransactionalWriter<R: TransactionalResource, B: BlobStore + 'static> {
    resource: Arc<R>,
    blobs: Arc<B>,
    environment: String,
    concurrency: usize,
}

impl<R: TransactionalResource, B: BlobStore + 'static> TransactionalWriter<R, B> {
    pub fn new(resource: Arc<R>, blobs: Arc<B>, environment: impl Into<String>, concurrency: usize) -> Self {
        Self {
            resource,
            blobs,
            environment: environment.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn resource(&self) -> &Arc<R> {
        &self.resource
    }

    /// `environment/kind/id/timestamp-batch-index-filename`
    ///
    /// `batch` is fresh per call, so two writes to one entity in the same
    /// millisecond never share a key.
    fn key_for(&self, id: i64, stamp: &str, index: usize, filename: &str) -> String {
        format!(
            "{}/{}/{}/{}-{}-{}",
            self.environment,
            R::KIND,
            id,
            stamp,
            index,
            sanitize_filename(filename)
        )
    }

    fn keyed(&self, id: i64, files: Vec<Upload>) -> Vec<(String, Upload)> {
        let batch = Uuid::new_v4().simple().to_string();
        let stamp = format!("{}-{}", Utc::now().timestamp_millis(), &batch[..8]);
        files
            .into_iter()
            .enumerate()
            .map(|(index, file)| (self.key_for(id, &stamp, index, &file.filename), file))
            .collect()
    }

    fn check_file_count(&self, count: usize) -> Result<(), ResourceError> {
        if R::MODE == AttachmentMode::ReplaceSingle && count > 1 {
            return Err(ResourceError::Validation(format!(
                "each {} holds at most one attachment, {count} provided",
                R::NOUN
            )));
        }
        Ok(())
    }

    fn not_found(id: i64) -> ResourceError {
        ResourceError::NotFound(format!("{} {id}", R::NOUN))
    }

    /// Insert a row and attach `files` to it atomically.
    ///
    /// The transaction stays open while the files upload. On any failure the
    /// uploaded blobs are deleted and the transaction rolled back, so neither
    /// a row nor a blob survives.
    pub async fn create_with_attachments(
        &self,
        draft: DraftOf<R>,
        files: Vec<Upload>,
        cancel: CancellationToken,
    ) -> Result<EntityOf<R>, ResourceError> {
        self.check_file_count(files.len())?;
        if cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }

        let mut tx = self.resource.begin().await?;
        let mut saga = UploadSaga::new(Arc::clone(&self.blobs), cancel);

        let staged = self.stage_create(&mut tx, draft, files, &mut saga).await;
        let entity = match staged {
            Ok(entity) => entity,
            Err(e) => {
                saga.compensate().await;
                rollback(tx, R::KIND).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            warn!(kind = R::KIND, error = %e, "commit failed, removing uploaded blobs");
            saga.compensate().await;
            return Err(e.into());
        }
        let refs = saga.disarm();

        info!(
            kind = R::KIND,
            id = entity.entity_id(),
            attachments = refs.len(),
            "created"
        );
        Ok(entity)
    }

    async fn stage_create(
        &self,
        tx: &mut R::Tx,
        draft: DraftOf<R>,
        files: Vec<Upload>,
        saga: &mut UploadSaga<B>,
    ) -> Result<EntityOf<R>, ResourceError> {
        let id = tx.insert(draft).await.map_err(|e| match e {
            // Foreign key rejected: the parent work order is gone.
            RepositoryError::NotFound => {
                ResourceError::NotFound(format!("work order referenced by this {}", R::NOUN))
            }
            other => other.into(),
        })?;
        if !files.is_empty() {
            let refs = saga.upload_batch(self.keyed(id, files), self.concurrency).await?;
            tx.set_attachments(id, &refs).await?;
        }
        tx.fetch(id).await?.ok_or_else(|| Self::not_found(id))
    }

    /// Apply a partial update and add `files` to an existing row.
    ///
    /// `authorize` sees the current row before anything is written. Uploads
    /// finish before the transaction opens; only blobs uploaded by this call
    /// are cleaned up on failure. An estimate attachment displaced by the new
    /// one is deleted after the commit.
    pub async fn update_with_attachments<F>(
        &self,
        id: i64,
        patch: <R::Tx as PatchTx>::Patch,
        files: Vec<Upload>,
        authorize: F,
        cancel: CancellationToken,
    ) -> Result<EntityOf<R>, ResourceError>
    where
        R::Tx: PatchTx,
        F: FnOnce(&EntityOf<R>) -> Result<(), ResourceError> + Send,
    {
        self.check_file_count(files.len())?;

        let current = self
            .resource
            .find(id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        authorize(&current)?;
        if cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }

        let mut saga = UploadSaga::new(Arc::clone(&self.blobs), cancel);
        let new_refs = match saga.upload_batch(self.keyed(id, files), self.concurrency).await {
            Ok(refs) => refs,
            Err(e) => {
                saga.compensate().await;
                return Err(e);
            }
        };

        let mut tx = match self.resource.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                saga.compensate().await;
                return Err(e.into());
            }
        };

        let staged = stage_update::<R>(&mut tx, id, patch, new_refs).await;
        let (entity, displaced) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                saga.compensate().await;
                rollback(tx, R::KIND).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            warn!(kind = R::KIND, id, error = %e, "commit failed, removing uploaded blobs");
            saga.compensate().await;
            return Err(e.into());
        }
        let added = saga.disarm();

        for reference in &displaced {
            if let Err(e) = self.blobs.delete(reference).await {
                warn!(kind = R::KIND, id, key = %reference, error = %e, "failed to delete replaced attachment");
            }
        }

        info!(
            kind = R::KIND,
            id,
            added = added.len(),
            replaced = displaced.len(),
            "updated"
        );
        Ok(entity)
    }

    /// Delete a row (and whatever cascades from it), then release every blob
    /// the removed rows referenced. Blob deletion failures are logged only.
    pub async fn delete_with_attachments<F>(&self, id: i64, authorize: F) -> Result<(), ResourceError>
    where
        R: RemovableResource,
        F: FnOnce(&EntityOf<R>) -> Result<(), ResourceError> + Send,
    {
        let current = self
            .resource
            .find(id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        authorize(&current)?;

        let released = self.resource.remove(id).await.map_err(|e| match e {
            RepositoryError::NotFound => Self::not_found(id),
            other => other.into(),
        })?;

        for reference in &released {
            if let Err(e) = self.blobs.delete(reference).await {
                warn!(kind = R::KIND, id, key = %reference, error = %e, "failed to delete blob of removed row");
            }
        }
        info!(kind = R::KIND, id, released = released.len(), "deleted");
        Ok(())
    }
}

async fn stage_update<R: TransactionalResource>(
    tx: &mut R::Tx,
    id: i64,
    patch: <R::Tx as PatchTx>::Patch,
    new_refs: Vec<String>,
) -> Result<(EntityOf<R>, Vec<String>), ResourceError>
where
    R::Tx: PatchTx,
{
    let not_found = || ResourceError::NotFound(format!("{} {id}", R::NOUN));

    tx.apply(id, patch).await.map_err(|e| match e {
        RepositoryError::NotFound => not_found(),
        other => other.into(),
    })?;

    let mut displaced = Vec::new();
    if !new_refs.is_empty() {
        // Read inside the transaction so a concurrent append is not lost.
        let existing = tx
            .fetch(id)
            .await?
            .ok_or_else(not_found)?
            .attachment_refs();
        let merged = match R::MODE {
            AttachmentMode::Append => existing.into_iter().chain(new_refs).collect::<Vec<_>>(),
            AttachmentMode::ReplaceSingle => {
                displaced = existing;
                new_refs
            }
        };
        tx.set_attachments(id, &merged).await?;
    }

    let entity = tx.fetch(id).await?.ok_or_else(not_found)?;
    Ok((entity, displaced))
}

async fn rollback<T: ResourceTx>(tx: T, kind: &str) {
    if let Err(e) = tx.rollback().await {
        warn!(kind, error = %e, "rollback failed");
    }
}

/// Keep key segments to a safe ASCII subset.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}
