//! Work order service.
//!
//! Users see and modify only their own work orders; admins see all. A work
//! order the caller may not access is reported as not found.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use workdesk_types::attachment::Upload;
use workdesk_types::error::ResourceError;
use workdesk_types::identity::Caller;
use workdesk_types::work_order::{
    CreateWorkOrderRequest, NewWorkOrder, WorkOrder, WorkOrderPatch, validate_description,
};

use crate::repository::resource::{PatchTx, RemovableResource, ResourceTx};
use crate::repository::work_order::WorkOrderRepository;
use crate::resource::signed::SignedAccessResolver;
use crate::resource::writer::TransactionalWriter;
use crate::storage::blob_store::BlobStore;

pub struct WorkOrderService<W, B>
where
    W: WorkOrderRepository
        + RemovableResource<
            Tx: ResourceTx<Entity = WorkOrder, Draft = NewWorkOrder> + PatchTx<Patch = WorkOrderPatch>,
        >,
    B: BlobStore + 'static,
{
    work_orders: Arc<W>,
    writer: TransactionalWriter<W, B>,
    resolver: Arc<SignedAccessResolver<B>>,
}

impl<W, B> WorkOrderService<W, B>
where
    W: WorkOrderRepository
        + RemovableResource<
            Tx: ResourceTx<Entity = WorkOrder, Draft = NewWorkOrder> + PatchTx<Patch = WorkOrderPatch>,
        >,
    B: BlobStore + 'static,
{
    pub fn new(writer: TransactionalWriter<W, B>, resolver: Arc<SignedAccessResolver<B>>) -> Self {
        Self {
            work_orders: Arc::clone(writer.resource()),
            writer,
            resolver,
        }
    }

    /// Create a work order owned by the caller with the given images.
    pub async fn create(
        &self,
        caller: Caller,
        request: CreateWorkOrderRequest,
        files: Vec<Upload>,
        cancel: CancellationToken,
    ) -> Result<WorkOrder, ResourceError> {
        let draft = NewWorkOrder {
            owner_user_id: caller.user_id,
            description: validate_description(&request.description)
                .map_err(ResourceError::Validation)?,
            location: non_blank(request.location),
            scheduled_date: request.scheduled_date,
        };
        let work_order = self
            .writer
            .create_with_attachments(draft, files, cancel)
            .await?;
        self.resolver.sign(work_order).await
    }

    pub async fn get(&self, caller: Caller, id: i64) -> Result<WorkOrder, ResourceError> {
        let work_order = self
            .work_orders
            .get(id)
            .await?
            .filter(|w| caller.can_access(w.owner_user_id))
            .ok_or_else(|| not_found(id))?;
        self.resolver.sign(work_order).await
    }

    /// The caller's work orders, or every work order for an admin.
    pub async fn list(&self, caller: Caller) -> Result<Vec<WorkOrder>, ResourceError> {
        let owner = (!caller.is_admin()).then_some(caller.user_id);
        let work_orders = self.work_orders.list(owner).await?;
        self.resolver.sign_all(work_orders).await
    }

    /// Apply a partial update and append images.
    pub async fn update(
        &self,
        caller: Caller,
        id: i64,
        mut patch: WorkOrderPatch,
        files: Vec<Upload>,
        cancel: CancellationToken,
    ) -> Result<WorkOrder, ResourceError> {
        if let Some(description) = patch.description.take() {
            patch.description =
                Some(validate_description(&description).map_err(ResourceError::Validation)?);
        }
        patch.location = non_blank(patch.location);

        let work_order = self
            .writer
            .update_with_attachments(id, patch, files, authorize(caller, id), cancel)
            .await?;
        self.resolver.sign(work_order).await
    }

    /// Delete a work order with its estimates, messages and every blob they
    /// referenced.
    pub async fn delete(&self, caller: Caller, id: i64) -> Result<(), ResourceError> {
        self.writer
            .delete_with_attachments(id, authorize(caller, id))
            .await
    }
}

fn not_found(id: i64) -> ResourceError {
    ResourceError::NotFound(format!("work order {id}"))
}

fn authorize(caller: Caller, id: i64) -> impl FnOnce(&WorkOrder) -> Result<(), ResourceError> + Send {
    move |work_order| {
        if caller.can_access(work_order.owner_user_id) {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
