//! Chat message repository trait definition.

use workdesk_types::error::RepositoryError;
use workdesk_types::message::Message;

/// Read side of message persistence. Messages are only inserted through
/// `TransactionalResource`.
pub trait MessageRepository: Send + Sync {
    /// One page of a work order's history ordered by `created_at` descending,
    /// ties by id descending. Returns the page and the total message count.
    fn page(
        &self,
        work_order_id: i64,
        offset: i64,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<(Vec<Message>, i64), RepositoryError>> + Send;
}
