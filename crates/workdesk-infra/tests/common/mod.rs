//! Shared wiring for the integration tests: a temp-dir SQLite pool, a
//! filesystem blob store and the core services on top of them.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use workdesk_core::chat::service::ChatService;
use workdesk_core::resource::signed::SignedAccessResolver;
use workdesk_core::resource::writer::TransactionalWriter;
use workdesk_core::service::estimate::EstimateService;
use workdesk_core::service::work_order::WorkOrderService;
use workdesk_core::storage::blob_store::BlobStore;
use workdesk_infra::blob::LocalBlobStore;
use workdesk_infra::session::MemorySessionStore;
use workdesk_infra::sqlite::estimate::SqliteEstimateRepository;
use workdesk_infra::sqlite::message::SqliteMessageRepository;
use workdesk_infra::sqlite::pool::DatabasePool;
use workdesk_infra::sqlite::work_order::SqliteWorkOrderRepository;
use workdesk_types::attachment::Upload;
use workdesk_types::error::BlobError;

pub const ENV: &str = "test";
pub const SIGNED_TTL: Duration = Duration::from_secs(600);

pub struct Harness<B: BlobStore + 'static> {
    pub pool: DatabasePool,
    pub blobs: Arc<B>,
    pub blob_root: PathBuf,
    pub work_orders: Arc<SqliteWorkOrderRepository>,
    pub sessions: Arc<MemorySessionStore>,
    _dir: TempDir,
}

pub async fn harness() -> Harness<LocalBlobStore> {
    harness_with(|store| store).await
}

/// Build a harness whose blob store is `wrap(local)`.
pub async fn harness_with<B, F>(wrap: F) -> Harness<B>
where
    B: BlobStore + 'static,
    F: FnOnce(LocalBlobStore) -> B,
{
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("workdesk.db").display());
    let pool = DatabasePool::new(&url).await.unwrap();

    let blob_root = dir.path().join("blobs");
    let local = LocalBlobStore::open(&blob_root, "workdesk", "http://localhost:3000", vec![9u8; 32])
        .await
        .unwrap();

    Harness {
        work_orders: Arc::new(SqliteWorkOrderRepository::new(pool.clone())),
        sessions: Arc::new(MemorySessionStore::new()),
        pool,
        blobs: Arc::new(wrap(local)),
        blob_root,
        _dir: dir,
    }
}

impl<B: BlobStore + 'static> Harness<B> {
    pub fn resolver(&self) -> Arc<SignedAccessResolver<B>> {
        Arc::new(SignedAccessResolver::new(Arc::clone(&self.blobs), SIGNED_TTL))
    }

    pub fn work_order_service(&self) -> WorkOrderService<SqliteWorkOrderRepository, B> {
        let writer = TransactionalWriter::new(
            Arc::clone(&self.work_orders),
            Arc::clone(&self.blobs),
            ENV,
            4,
        );
        WorkOrderService::new(writer, self.resolver())
    }

    pub fn estimate_service(
        &self,
    ) -> EstimateService<SqliteEstimateRepository, SqliteWorkOrderRepository, B> {
        let writer = TransactionalWriter::new(
            Arc::new(SqliteEstimateRepository::new(self.pool.clone())),
            Arc::clone(&self.blobs),
            ENV,
            4,
        );
        EstimateService::new(writer, Arc::clone(&self.work_orders), self.resolver())
    }

    pub fn chat_service(
        &self,
        session_ttl: Duration,
    ) -> ChatService<MemorySessionStore, SqliteWorkOrderRepository, SqliteMessageRepository, B> {
        let writer = TransactionalWriter::new(
            Arc::new(SqliteMessageRepository::new(self.pool.clone())),
            Arc::clone(&self.blobs),
            ENV,
            4,
        );
        ChatService::new(
            Arc::clone(&self.sessions),
            Arc::clone(&self.work_orders),
            writer,
            self.resolver(),
            session_ttl,
        )
    }

    /// Number of stored objects under the blob root.
    pub fn blob_count(&self) -> usize {
        count_files(&self.blob_root)
    }

    pub async fn count_rows(&self, table: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool.reader)
            .await
            .unwrap();
        count
    }
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}

pub fn png(name: &str) -> Upload {
    Upload::new(name, "image/png", vec![0x89, b'P', b'N', b'G', 1, 2, 3])
}

/// Blob store that refuses uploads whose key contains `pattern`, after a
/// short delay so sibling uploads in the batch get to finish first.
pub struct FailingBlobs {
    inner: LocalBlobStore,
    pattern: String,
}

impl FailingBlobs {
    pub fn wrap(pattern: &str) -> impl FnOnce(LocalBlobStore) -> FailingBlobs {
        let pattern = pattern.to_string();
        move |inner| FailingBlobs { inner, pattern }
    }
}

impl BlobStore for FailingBlobs {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        if key.contains(&self.pattern) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            return Err(BlobError::Io(format!("injected failure for {key}")));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn signed_url(&self, reference: &str, ttl: Duration) -> Result<String, BlobError> {
        self.inner.signed_url(reference, ttl).await
    }

    async fn delete(&self, reference: &str) -> Result<(), BlobError> {
        self.inner.delete(reference).await
    }
}
