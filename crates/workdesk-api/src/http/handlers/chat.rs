//! Work order chat handlers.
//!
//! Every route except start carries the session id in `X-Session-Id`; the
//! session guard decides admission before anything is written.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use workdesk_core::chat::service::ChatInput;
use workdesk_types::message::{Message, MessageBody, MessageMetadata, MessagePage};
use workdesk_types::session::SessionStarted;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthCaller;
use crate::http::extractors::multipart::read_form;
use crate::http::extractors::session::SessionHeader;
use crate::http::handlers::run_detached;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

/// Body of `POST /chat/messages`: `{"type": "text", "content": "...", "metadata": {...}}`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(flatten)]
    pub body: MessageBody,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn messages_link(work_order_id: i64) -> String {
    format!("/api/v1/work-orders/{work_order_id}/chat/messages")
}

/// POST /api/v1/work-orders/{id}/chat - Start a chat session.
pub async fn start_chat(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    Path(work_order_id): Path<i64>,
) -> Result<ApiResponse<SessionStarted>, AppError> {
    let session = state.chat_service.start(caller, work_order_id).await?;

    Ok(clock
        .ok(SessionStarted::from(&session))
        .with_status(StatusCode::CREATED)
        .with_link("messages", &messages_link(work_order_id)))
}

/// DELETE /api/v1/work-orders/{id}/chat - Close the caller's session.
pub async fn close_chat(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    session: SessionHeader,
    Path(work_order_id): Path<i64>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    state
        .chat_service
        .close(caller, work_order_id, session.as_deref())
        .await?;
    Ok(clock.ok(serde_json::json!({"closed": true, "work_order_id": work_order_id})))
}

/// POST /api/v1/work-orders/{id}/chat/messages - Send a text or AI response message.
pub async fn send_message(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    SessionHeader(session_id): SessionHeader,
    Path(work_order_id): Path<i64>,
    Json(request): Json<SendMessageRequest>,
) -> Result<ApiResponse<Message>, AppError> {
    let input = ChatInput {
        body: request.body,
        metadata: request.metadata,
    };

    let service = Arc::clone(&state.chat_service);
    let message = run_detached(state.request_timeout(), move |cancel| async move {
        service
            .send_message(caller, work_order_id, session_id.as_deref(), input, cancel)
            .await
            .map_err(AppError::from)
    })
    .await?;

    Ok(clock
        .ok(message)
        .with_status(StatusCode::CREATED)
        .with_link("messages", &messages_link(work_order_id)))
}

/// POST /api/v1/work-orders/{id}/chat/images - Send an image message.
pub async fn send_images(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    SessionHeader(session_id): SessionHeader,
    Path(work_order_id): Path<i64>,
    multipart: Multipart,
) -> Result<ApiResponse<Message>, AppError> {
    let form = read_form(multipart, "images", &state.config.attachments).await?;

    let service = Arc::clone(&state.chat_service);
    let message = run_detached(state.request_timeout(), move |cancel| async move {
        service
            .send_images(caller, work_order_id, session_id.as_deref(), form.files, cancel)
            .await
            .map_err(AppError::from)
    })
    .await?;

    Ok(clock
        .ok(message)
        .with_status(StatusCode::CREATED)
        .with_link("messages", &messages_link(work_order_id)))
}

/// GET /api/v1/work-orders/{id}/chat/messages - One page of history, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    clock: RequestClock,
    AuthCaller(caller): AuthCaller,
    session: SessionHeader,
    Path(work_order_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<ApiResponse<MessagePage>, AppError> {
    let page = state
        .chat_service
        .history(caller, work_order_id, session.as_deref(), query.page, query.limit)
        .await?;

    let link = format!(
        "{}?page={}&limit={}",
        messages_link(work_order_id),
        page.page + 1,
        page.limit
    );
    let has_next = i64::from(page.page) * i64::from(page.limit) < page.total;

    let response = clock.ok(page).with_link("self", &messages_link(work_order_id));
    Ok(if has_next {
        response.with_link("next", &link)
    } else {
        response
    })
}
