//! Estimate CRUD handlers for the REST API.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use workdesk_types::attachment::Upload;
use workdesk_types::estimate::{Estimate, EstimateFilter, EstimatePatch, NewEstimate};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthCaller;
use crate::http::extractors::multipart::{MultipartForm, read_form};
use crate::http::handlers::run_detached;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

const ATTACHMENT_FIELD: &str = "attachment";

/// Query parameters for `GET /api/v1/estimates`.
#[derive(Debug, Default, Deserialize)]
pub struct EstimateListQuery {
    pub work_order_id: Option<i64>,
    pub vendor_id: Option<i64>,
    pub limit: Option<i64>,
}

/// An estimate carries at most one file.
fn single_attachment(form: &mut MultipartForm) -> Result<Option<Upload>, AppError> {
    if form.files.len() > 1 {
        return Err(AppError::Validation(
            "an estimate accepts a single attachment".to_string(),
        ));
    }
    Ok(form.files.pop())
}

fn self_link(id: i64) -> String {
    format!("/api/v1/estimates/{id}")
}

/// POST /api/v1/estimates - Create an estimate on an accessible work order.
pub async fn create_estimate(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    multipart: Multipart,
) -> Result<ApiResponse<Estimate>, AppError> {
    let mut form = read_form(multipart, ATTACHMENT_FIELD, &state.config.attachments).await?;

    let draft = NewEstimate {
        work_order_id: form.require("work_order_id")?,
        vendor_id: form.require("vendor_id")?,
        cost: form.require("cost")?,
    };
    let attachment = single_attachment(&mut form)?;

    let service = Arc::clone(&state.estimate_service);
    let created = run_detached(state.request_timeout(), move |cancel| async move {
        service.create(caller, draft, attachment, cancel).await.map_err(AppError::from)
    })
    .await?;

    let link = self_link(created.id);
    let work_order_link = format!("/api/v1/work-orders/{}", created.work_order_id);
    Ok(clock
        .ok(created)
        .with_status(StatusCode::CREATED)
        .with_link("self", &link)
        .with_link("work_order", &work_order_link))
}

/// GET /api/v1/estimates - List estimates visible to the caller.
pub async fn list_estimates(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    Query(query): Query<EstimateListQuery>,
) -> Result<ApiResponse<Vec<Estimate>>, AppError> {
    let filter = EstimateFilter {
        work_order_id: query.work_order_id,
        vendor_id: query.vendor_id,
        owner_user_id: None,
        limit: query.limit,
    };
    let estimates = state.estimate_service.list(caller, filter).await?;

    Ok(clock.ok(estimates).with_link("self", "/api/v1/estimates"))
}

/// GET /api/v1/estimates/{id} - Fetch one estimate.
pub async fn get_estimate(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<i64>,
) -> Result<ApiResponse<Estimate>, AppError> {
    let estimate = state.estimate_service.get(caller, id).await?;
    Ok(clock.ok(estimate).with_link("self", &self_link(id)))
}

/// PUT /api/v1/estimates/{id} - Partial update; a new file replaces the old one.
pub async fn update_estimate(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<ApiResponse<Estimate>, AppError> {
    let mut form = read_form(multipart, ATTACHMENT_FIELD, &state.config.attachments).await?;

    let patch = EstimatePatch {
        vendor_id: form.parse("vendor_id")?,
        cost: form.parse("cost")?,
    };
    let attachment = single_attachment(&mut form)?;

    let service = Arc::clone(&state.estimate_service);
    let updated = run_detached(state.request_timeout(), move |cancel| async move {
        service.update(caller, id, patch, attachment, cancel).await.map_err(AppError::from)
    })
    .await?;

    Ok(clock.ok(updated).with_link("self", &self_link(id)))
}

/// DELETE /api/v1/estimates/{id} - Delete an estimate and its attachment.
pub async fn delete_estimate(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<i64>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let service = Arc::clone(&state.estimate_service);
    run_detached(state.request_timeout(), move |_| async move {
        service.delete(caller, id).await.map_err(AppError::from)
    })
    .await?;

    Ok(clock.ok(serde_json::json!({"deleted": true, "id": id})))
}
