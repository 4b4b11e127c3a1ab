//! Upload saga: the compensation stack behind every attachment write.
//!
//! Each blob that may exist because of this operation is pushed onto a stack.
//! On failure the stack is popped and each blob deleted in reverse order. A
//! successful commit disarms the saga. A saga dropped while still armed (its
//! task aborted mid-flight) hands the remaining keys to a background cleanup
//! task.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use workdesk_types::attachment::Upload;
use workdesk_types::error::{BlobError, ResourceError};

use crate::storage::blob_store::BlobStore;

/// Outcome of a single upload attempt.
enum Attempt {
    Stored(String),
    Failed(BlobError),
    /// Stopped before completion; the object may or may not exist.
    Interrupted,
}

pub struct UploadSaga<B: BlobStore + 'static> {
    blobs: Arc<B>,
    completed: Vec<String>,
    cancel: CancellationToken,
}

impl<B: BlobStore + 'static> UploadSaga<B> {
    pub fn new(blobs: Arc<B>, cancel: CancellationToken) -> Self {
        Self {
            blobs,
            completed: Vec::new(),
            cancel,
        }
    }

    /// Upload a batch of `(key, file)` pairs with at most `concurrency` in
    /// flight. Returns references in batch order.
    ///
    /// Every attempt finishes (or is interrupted) before this returns. The
    /// first definite failure interrupts the rest of the batch; interrupted
    /// keys are still recorded for compensation since their outcome is
    /// unknown. Cancellation of the outer token wins over upload errors.
    pub async fn upload_batch(
        &mut self,
        files: Vec<(String, Upload)>,
        concurrency: usize,
    ) -> Result<Vec<String>, ResourceError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let batch = self.cancel.child_token();
        let attempts: Vec<(String, Attempt)> = stream::iter(files.into_iter().map(|(key, upload)| {
            let blobs = Arc::clone(&self.blobs);
            let batch = batch.clone();
            async move {
                let attempt = tokio::select! {
                    biased;
                    _ = batch.cancelled() => Attempt::Interrupted,
                    result = blobs.put(&key, upload.data, &upload.content_type) => match result {
                        Ok(reference) => Attempt::Stored(reference),
                        Err(e) => {
                            batch.cancel();
                            Attempt::Failed(e)
                        }
                    },
                };
                (key, attempt)
            }
        }))
        .buffered(concurrency.max(1))
        .collect()
        .await;

        let mut refs = Vec::with_capacity(attempts.len());
        let mut first_error: Option<BlobError> = None;
        for (key, attempt) in attempts {
            match attempt {
                Attempt::Stored(reference) => {
                    debug!(key = %reference, "blob uploaded");
                    self.completed.push(reference.clone());
                    refs.push(reference);
                }
                Attempt::Interrupted => self.completed.push(key),
                Attempt::Failed(e) => {
                    warn!(key = %key, error = %e, "blob upload failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(refs),
        }
    }

    /// Undo every recorded upload, newest first. Delete failures are logged
    /// and never replace the error that triggered compensation.
    pub async fn compensate(&mut self) {
        while let Some(key) = self.completed.pop() {
            match self.blobs.delete(&key).await {
                Ok(()) => debug!(key = %key, "compensated blob upload"),
                Err(e) => warn!(key = %key, error = %e, "compensating blob delete failed"),
            }
        }
    }

    /// Keep everything uploaded so far. Call only after the commit succeeded.
    pub fn disarm(&mut self) -> Vec<String> {
        std::mem::take(&mut self.completed)
    }

    pub fn pending(&self) -> &[String] {
        &self.completed
    }
}

impl<B: BlobStore + 'static> Drop for UploadSaga<B> {
    fn drop(&mut self) {
        if self.completed.is_empty() {
            return;
        }
        let keys = std::mem::take(&mut self.completed);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let blobs = Arc::clone(&self.blobs);
                handle.spawn(async move {
                    for key in keys.iter().rev() {
                        if let Err(e) = blobs.delete(key).await {
                            warn!(key = %key, error = %e, "deferred blob cleanup failed");
                        }
                    }
                });
            }
            Err(_) => {
                warn!(count = keys.len(), "upload saga dropped outside a runtime; blobs left behind");
            }
        }
    }
}
