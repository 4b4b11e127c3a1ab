//! Axum router configuration with middleware.
//!
//! API routes live under `/api/v1/` and require a bearer token. Signed blob
//! downloads and the health check are mounted at the root without auth.
//! Middleware: request clock, body limit, CORS, tracing.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::response::envelope_meta;
use crate::state::AppState;

/// Headroom for multipart framing and text fields on top of the file bytes.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let policy = &state.config.attachments;
    let body_limit = policy.max_files * policy.max_file_bytes + FORM_OVERHEAD_BYTES;

    let api_routes = Router::new()
        // Work orders
        .route(
            "/work-orders",
            post(handlers::work_order::create_work_order).get(handlers::work_order::list_work_orders),
        )
        .route(
            "/work-orders/{id}",
            get(handlers::work_order::get_work_order)
                .put(handlers::work_order::update_work_order)
                .delete(handlers::work_order::delete_work_order),
        )
        // Estimates
        .route(
            "/estimates",
            post(handlers::estimate::create_estimate).get(handlers::estimate::list_estimates),
        )
        .route(
            "/estimates/{id}",
            get(handlers::estimate::get_estimate)
                .put(handlers::estimate::update_estimate)
                .delete(handlers::estimate::delete_estimate),
        )
        // Chat
        .route(
            "/work-orders/{id}/chat",
            post(handlers::chat::start_chat).delete(handlers::chat::close_chat),
        )
        .route(
            "/work-orders/{id}/chat/messages",
            post(handlers::chat::send_message).get(handlers::chat::get_history),
        )
        .route(
            "/work-orders/{id}/chat/images",
            post(handlers::chat::send_images),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/blobs/{*key}", get(handlers::blob::get_blob))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(envelope_meta))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
