//! Work order repository trait definition.

use workdesk_types::error::RepositoryError;
use workdesk_types::work_order::WorkOrder;

/// Read side of work order persistence.
///
/// Writes go through `TransactionalResource` so that rows and attachments
/// commit together.
pub trait WorkOrderRepository: Send + Sync {
    /// Get a work order by id.
    fn get(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<WorkOrder>, RepositoryError>> + Send;

    /// List work orders, newest first. `owner_user_id: None` lists all.
    fn list(
        &self,
        owner_user_id: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<WorkOrder>, RepositoryError>> + Send;
}
