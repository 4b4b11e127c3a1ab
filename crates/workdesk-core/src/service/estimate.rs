//! Estimate service.
//!
//! Access to an estimate follows its work order: the work order's owner and
//! admins may read and modify it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use workdesk_types::attachment::Upload;
use workdesk_types::error::ResourceError;
use workdesk_types::estimate::{Estimate, EstimateFilter, EstimatePatch, NewEstimate, validate_cost};
use workdesk_types::identity::Caller;

use crate::repository::estimate::EstimateRepository;
use crate::repository::resource::{PatchTx, RemovableResource, ResourceTx};
use crate::repository::work_order::WorkOrderRepository;
use crate::resource::signed::SignedAccessResolver;
use crate::resource::writer::TransactionalWriter;
use crate::storage::blob_store::BlobStore;

/// Upper bound on `limit` for estimate listings.
pub const MAX_LIST_LIMIT: i64 = 100;

pub struct EstimateService<E, W, B>
where
    E: EstimateRepository
        + RemovableResource<
            Tx: ResourceTx<Entity = Estimate, Draft = NewEstimate> + PatchTx<Patch = EstimatePatch>,
        >,
    W: WorkOrderRepository,
    B: BlobStore + 'static,
{
    estimates: Arc<E>,
    work_orders: Arc<W>,
    writer: TransactionalWriter<E, B>,
    resolver: Arc<SignedAccessResolver<B>>,
}

impl<E, W, B> EstimateService<E, W, B>
where
    E: EstimateRepository
        + RemovableResource<
            Tx: ResourceTx<Entity = Estimate, Draft = NewEstimate> + PatchTx<Patch = EstimatePatch>,
        >,
    W: WorkOrderRepository,
    B: BlobStore + 'static,
{
    pub fn new(
        writer: TransactionalWriter<E, B>,
        work_orders: Arc<W>,
        resolver: Arc<SignedAccessResolver<B>>,
    ) -> Self {
        Self {
            estimates: Arc::clone(writer.resource()),
            work_orders,
            writer,
            resolver,
        }
    }

    /// Create an estimate on a work order the caller can access, with at
    /// most one attachment.
    pub async fn create(
        &self,
        caller: Caller,
        mut draft: NewEstimate,
        attachment: Option<Upload>,
        cancel: CancellationToken,
    ) -> Result<Estimate, ResourceError> {
        draft.cost = validate_cost(draft.cost).map_err(ResourceError::Validation)?;
        self.check_work_order(caller, draft.work_order_id).await?;

        let estimate = self
            .writer
            .create_with_attachments(draft, attachment.into_iter().collect(), cancel)
            .await?;
        self.resolver.sign(estimate).await
    }

    pub async fn get(&self, caller: Caller, id: i64) -> Result<Estimate, ResourceError> {
        let estimate = self.accessible(caller, id).await?;
        self.resolver.sign(estimate).await
    }

    pub async fn list(
        &self,
        caller: Caller,
        mut filter: EstimateFilter,
    ) -> Result<Vec<Estimate>, ResourceError> {
        if let Some(limit) = filter.limit {
            if !(1..=MAX_LIST_LIMIT).contains(&limit) {
                return Err(ResourceError::Validation(format!(
                    "limit must be between 1 and {MAX_LIST_LIMIT}"
                )));
            }
        }
        filter.owner_user_id = (!caller.is_admin()).then_some(caller.user_id);
        let estimates = self.estimates.list(&filter).await?;
        self.resolver.sign_all(estimates).await
    }

    /// Apply a partial update. A new attachment replaces the old one, which
    /// is deleted after the update commits.
    pub async fn update(
        &self,
        caller: Caller,
        id: i64,
        patch: EstimatePatch,
        attachment: Option<Upload>,
        cancel: CancellationToken,
    ) -> Result<Estimate, ResourceError> {
        if let Some(cost) = patch.cost {
            validate_cost(cost).map_err(ResourceError::Validation)?;
        }
        let current = self.accessible(caller, id).await?;

        let estimate = self
            .writer
            .update_with_attachments(
                id,
                patch,
                attachment.into_iter().collect(),
                same_work_order(current.work_order_id, id),
                cancel,
            )
            .await?;
        self.resolver.sign(estimate).await
    }

    pub async fn delete(&self, caller: Caller, id: i64) -> Result<(), ResourceError> {
        let current = self.accessible(caller, id).await?;
        self.writer
            .delete_with_attachments(id, same_work_order(current.work_order_id, id))
            .await
    }

    /// Load an estimate the caller may access through its work order.
    async fn accessible(&self, caller: Caller, id: i64) -> Result<Estimate, ResourceError> {
        let estimate = self
            .estimates
            .get(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        self.check_work_order(caller, estimate.work_order_id)
            .await
            .map_err(|_| not_found(id))?;
        Ok(estimate)
    }

    async fn check_work_order(&self, caller: Caller, work_order_id: i64) -> Result<(), ResourceError> {
        match self.work_orders.get(work_order_id).await? {
            Some(work_order) if caller.can_access(work_order.owner_user_id) => Ok(()),
            _ => Err(ResourceError::NotFound(format!("work order {work_order_id}"))),
        }
    }
}

fn not_found(id: i64) -> ResourceError {
    ResourceError::NotFound(format!("estimate {id}"))
}

fn same_work_order(
    work_order_id: i64,
    id: i64,
) -> impl FnOnce(&Estimate) -> Result<(), ResourceError> + Send {
    move |estimate| {
        if estimate.work_order_id == work_order_id {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }
}
