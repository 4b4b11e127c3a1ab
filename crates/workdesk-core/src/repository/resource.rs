//! Transactional resource ports.
//!
//! An entity that carries blob references is written through a relational
//! transaction so that the row and its reference list commit together. The
//! transactional writer drives these traits; SQLite implementations live in
//! workdesk-infra.

use workdesk_types::attachment::Attachments;
use workdesk_types::error::RepositoryError;

/// How new attachment references combine with the stored ones on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentMode {
    /// New references are appended after the existing ones.
    Append,
    /// At most one reference; a new upload displaces the old one.
    ReplaceSingle,
}

/// An open relational transaction over one entity table.
///
/// Dropping a transaction without committing rolls it back.
pub trait ResourceTx: Send + Sized {
    type Entity: Attachments + Clone + Send + Sync + 'static;
    type Draft: Send + 'static;

    /// Insert a row with an empty attachment list. Returns the new id.
    fn insert(
        &mut self,
        draft: Self::Draft,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Read a row as seen from inside this transaction.
    fn fetch(
        &mut self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Self::Entity>, RepositoryError>> + Send;

    /// Overwrite the row's full reference list.
    fn set_attachments(
        &mut self,
        id: i64,
        refs: &[String],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn commit(self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn rollback(self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// A transaction that can also apply partial updates.
pub trait PatchTx: ResourceTx {
    type Patch: Send + 'static;

    /// Apply a partial update. `RepositoryError::NotFound` if the row is gone.
    fn apply(
        &mut self,
        id: i64,
        patch: Self::Patch,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// An entity table written through transactions.
pub trait TransactionalResource: Send + Sync + 'static {
    type Tx: ResourceTx;

    /// Path segment used in blob keys (`environment/KIND/id/...`).
    const KIND: &'static str;

    /// Human-readable singular name for errors.
    const NOUN: &'static str;

    const MODE: AttachmentMode;

    fn begin(&self) -> impl std::future::Future<Output = Result<Self::Tx, RepositoryError>> + Send;

    /// Read a committed row.
    fn find(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<EntityOf<Self>>, RepositoryError>> + Send;
}

/// Entity type written by a resource.
pub type EntityOf<R> = <<R as TransactionalResource>::Tx as ResourceTx>::Entity;

/// Draft type inserted by a resource.
pub type DraftOf<R> = <<R as TransactionalResource>::Tx as ResourceTx>::Draft;

/// A resource whose rows can be deleted.
pub trait RemovableResource: TransactionalResource {
    /// Delete the row and anything that cascades from it in one transaction.
    ///
    /// Returns every blob reference held by the removed rows so the caller can
    /// release them after the commit. `RepositoryError::NotFound` if absent.
    fn remove(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}
