//! Writer-pool transaction shared by the SQLite resources.

use std::marker::PhantomData;

use sqlx::{Sqlite, Transaction};
use tracing::debug;
use workdesk_types::error::RepositoryError;

use super::pool::{DatabasePool, query_error};

/// An open transaction on the writer connection, typed by the entity it
/// writes. Dropping it without commit rolls back.
pub struct SqliteTx<E> {
    pub(crate) tx: Transaction<'static, Sqlite>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> SqliteTx<E> {
    pub(crate) async fn begin(pool: &DatabasePool) -> Result<Self, RepositoryError> {
        let tx = pool.writer.begin().await.map_err(query_error)?;
        Ok(Self {
            tx,
            _entity: PhantomData,
        })
    }

    pub(crate) async fn commit_inner(self) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(query_error)?;
        debug!("transaction committed");
        Ok(())
    }

    pub(crate) async fn rollback_inner(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await.map_err(query_error)?;
        debug!("transaction rolled back");
        Ok(())
    }
}
