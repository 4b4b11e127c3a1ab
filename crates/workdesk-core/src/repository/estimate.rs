//! Estimate repository trait definition.

use workdesk_types::error::RepositoryError;
use workdesk_types::estimate::{Estimate, EstimateFilter};

/// Read side of estimate persistence.
pub trait EstimateRepository: Send + Sync {
    fn get(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Estimate>, RepositoryError>> + Send;

    /// List estimates matching the filter, newest first.
    fn list(
        &self,
        filter: &EstimateFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Estimate>, RepositoryError>> + Send;
}
