//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository/store traits, but AppState pins them
//! to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use workdesk_core::chat::service::ChatService;
use workdesk_core::resource::signed::SignedAccessResolver;
use workdesk_core::resource::writer::TransactionalWriter;
use workdesk_core::service::estimate::EstimateService;
use workdesk_core::service::work_order::WorkOrderService;
use workdesk_infra::blob::{LocalBlobStore, load_or_create_signing_key};
use workdesk_infra::config::{SIGNING_KEY_FILE, blob_root, load_service_config, resolve_data_dir};
use workdesk_infra::session::MemorySessionStore;
use workdesk_infra::sqlite::estimate::SqliteEstimateRepository;
use workdesk_infra::sqlite::identity::SqliteIdentityProvider;
use workdesk_infra::sqlite::message::SqliteMessageRepository;
use workdesk_infra::sqlite::pool::{DatabasePool, database_url};
use workdesk_infra::sqlite::work_order::SqliteWorkOrderRepository;
use workdesk_types::config::ServiceConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteWorkOrderService = WorkOrderService<SqliteWorkOrderRepository, LocalBlobStore>;

pub type ConcreteEstimateService =
    EstimateService<SqliteEstimateRepository, SqliteWorkOrderRepository, LocalBlobStore>;

pub type ConcreteChatService = ChatService<
    MemorySessionStore,
    SqliteWorkOrderRepository,
    SqliteMessageRepository,
    LocalBlobStore,
>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub identity: Arc<SqliteIdentityProvider>,
    pub sessions: Arc<MemorySessionStore>,
    pub blobs: Arc<LocalBlobStore>,
    pub work_order_service: Arc<ConcreteWorkOrderService>,
    pub estimate_service: Arc<ConcreteEstimateService>,
    pub chat_service: Arc<ConcreteChatService>,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, open
    /// the blob store, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_service_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let signing_key = load_or_create_signing_key(&data_dir.join(SIGNING_KEY_FILE)).await?;
        let blobs = LocalBlobStore::open(
            &blob_root(&config, &data_dir),
            &config.blob.bucket,
            &config.blob.public_base_url,
            signing_key,
        )
        .await?;

        Ok(Self::build(config, data_dir, db_pool, blobs))
    }

    /// Wire services over already-opened stores.
    pub fn build(
        config: ServiceConfig,
        data_dir: PathBuf,
        db_pool: DatabasePool,
        blobs: LocalBlobStore,
    ) -> Self {
        let blobs = Arc::new(blobs);
        let sessions = Arc::new(MemorySessionStore::new());
        let work_orders = Arc::new(SqliteWorkOrderRepository::new(db_pool.clone()));
        let resolver = Arc::new(SignedAccessResolver::new(
            Arc::clone(&blobs),
            Duration::from_secs(config.blob.signed_url_ttl_seconds),
        ));

        let work_order_service = WorkOrderService::new(
            TransactionalWriter::new(
                Arc::clone(&work_orders),
                Arc::clone(&blobs),
                config.environment.clone(),
                config.upload_concurrency,
            ),
            Arc::clone(&resolver),
        );

        let estimate_service = EstimateService::new(
            TransactionalWriter::new(
                Arc::new(SqliteEstimateRepository::new(db_pool.clone())),
                Arc::clone(&blobs),
                config.environment.clone(),
                config.upload_concurrency,
            ),
            Arc::clone(&work_orders),
            Arc::clone(&resolver),
        );

        let chat_service = ChatService::new(
            Arc::clone(&sessions),
            work_orders,
            TransactionalWriter::new(
                Arc::new(SqliteMessageRepository::new(db_pool.clone())),
                Arc::clone(&blobs),
                config.environment.clone(),
                config.upload_concurrency,
            ),
            resolver,
            Duration::from_secs(config.session.ttl_seconds),
        );

        Self {
            config: Arc::new(config),
            data_dir,
            identity: Arc::new(SqliteIdentityProvider::new(db_pool.clone())),
            db_pool,
            sessions,
            blobs,
            work_order_service: Arc::new(work_order_service),
            estimate_service: Arc::new(estimate_service),
            chat_service: Arc::new(chat_service),
        }
    }

    /// Deadline for writer operations, after which they are cancelled.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.server.request_timeout_secs)
    }
}
