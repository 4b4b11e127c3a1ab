//! Signed blob downloads.
//!
//! Links are issued by the signed-access resolver; the signature is the only
//! credential, so this route sits outside bearer auth.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::Deserialize;

use workdesk_infra::blob::detect_mime;
use workdesk_types::error::BlobError;

use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// GET /blobs/{*key} - Serve a blob behind a valid, unexpired signature.
pub async fn get_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(expires), Some(signature)) = (query.expires, query.signature.as_deref()) else {
        return Err(BlobError::InvalidSignature.into());
    };
    state.blobs.verify(&key, expires, signature)?;
    let data = state.blobs.read(&key).await?;

    tracing::debug!(key = %key, bytes = data.len(), "serving signed blob");

    Ok((
        [
            (header::CONTENT_TYPE, detect_mime(&key)),
            (header::CACHE_CONTROL, "private, max-age=60".to_string()),
        ],
        data,
    ))
}
