//! Work order CRUD handlers for the REST API.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use tracing::warn;

use workdesk_types::work_order::{
    CreateWorkOrderRequest, WorkOrder, WorkOrderPatch, WorkOrderStatus, parse_scheduled_date,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthCaller;
use crate::http::extractors::multipart::{MultipartForm, read_form};
use crate::http::handlers::run_detached;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

const IMAGES_FIELD: &str = "images";

fn scheduled_date(form: &MultipartForm) -> Result<Option<chrono::NaiveDate>, AppError> {
    form.text("scheduled_date")
        .map(parse_scheduled_date)
        .transpose()
        .map_err(AppError::Validation)
}

fn self_link(id: i64) -> String {
    format!("/api/v1/work-orders/{id}")
}

/// POST /api/v1/work-orders - Create a work order with optional images.
pub async fn create_work_order(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    multipart: Multipart,
) -> Result<ApiResponse<WorkOrder>, AppError> {
    let form = read_form(multipart, IMAGES_FIELD, &state.config.attachments).await?;

    let request = CreateWorkOrderRequest {
        description: form.text("description").unwrap_or_default().to_string(),
        location: form.text("location").map(str::to_string),
        scheduled_date: scheduled_date(&form)?,
    };

    let service = Arc::clone(&state.work_order_service);
    let created = run_detached(state.request_timeout(), move |cancel| async move {
        service.create(caller, request, form.files, cancel).await.map_err(AppError::from)
    })
    .await?;

    let link = self_link(created.id);
    Ok(clock
        .ok(created)
        .with_status(StatusCode::CREATED)
        .with_link("self", &link))
}

/// GET /api/v1/work-orders - List the caller's work orders (all for admins).
pub async fn list_work_orders(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
) -> Result<ApiResponse<Vec<WorkOrder>>, AppError> {
    let work_orders = state.work_order_service.list(caller).await?;
    Ok(clock.ok(work_orders).with_link("self", "/api/v1/work-orders"))
}

/// GET /api/v1/work-orders/{id} - Fetch one work order.
pub async fn get_work_order(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<i64>,
) -> Result<ApiResponse<WorkOrder>, AppError> {
    let work_order = state.work_order_service.get(caller, id).await?;
    Ok(clock
        .ok(work_order)
        .with_link("self", &self_link(id))
        .with_link("chat", &format!("/api/v1/work-orders/{id}/chat")))
}

/// PUT /api/v1/work-orders/{id} - Partial update; new images are appended.
pub async fn update_work_order(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<ApiResponse<WorkOrder>, AppError> {
    let form = read_form(multipart, IMAGES_FIELD, &state.config.attachments).await?;

    let patch = WorkOrderPatch {
        description: form.text("description").map(str::to_string),
        location: form.text("location").map(str::to_string),
        status: form.parse::<WorkOrderStatus>("status")?,
        scheduled_date: scheduled_date(&form)?,
    };

    let service = Arc::clone(&state.work_order_service);
    let updated = run_detached(state.request_timeout(), move |cancel| async move {
        service.update(caller, id, patch, form.files, cancel).await.map_err(AppError::from)
    })
    .await?;

    Ok(clock.ok(updated).with_link("self", &self_link(id)))
}

/// DELETE /api/v1/work-orders/{id} - Delete a work order and every blob it owns.
///
/// A live chat session on the work order is ended with it.
pub async fn delete_work_order(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<i64>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let service = Arc::clone(&state.work_order_service);
    let chat = Arc::clone(&state.chat_service);
    run_detached(state.request_timeout(), move |_| async move {
        service.delete(caller, id).await.map_err(AppError::from)?;
        if let Err(e) = chat.release_work_order(id).await {
            warn!(work_order_id = id, error = %e, "failed to release chat session of deleted work order");
        }
        Ok::<_, AppError>(())
    })
    .await?;

    Ok(clock.ok(serde_json::json!({"deleted": true, "id": id})))
}
