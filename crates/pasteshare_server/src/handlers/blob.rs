//! Signed blob download handler.

use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use pasteshare_core::blob::{content_type_for_key, BlobStore as _};
use serde::Deserialize;

/// Query carried by signed blob links.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: Option<u64>,
    pub sig: Option<String>,
}

/// Stream one blob if its link is signed and unexpired.
///
/// Bad or expired signatures answer 404 so object keys cannot be probed.
///
/// # Errors
/// Returns 404 for invalid links or missing objects, 500 on storage failure.
pub async fn serve_blob(
    State(state): State<AppState>,
    Path(object_key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, HttpError> {
    let (Some(expires), Some(sig)) = (query.expires, query.sig.as_deref()) else {
        return Err(AppError::NotFound.into());
    };
    if !state.signer.verify(&object_key, expires, sig) {
        tracing::debug!("Rejected blob link for {}", object_key);
        return Err(AppError::NotFound.into());
    }

    let blob = state.blobs.fetch(&object_key).await.map_err(AppError::from)?;
    let content_type = blob
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static(content_type_for_key(&object_key)));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, no-store")),
        ],
        blob.bytes,
    )
        .into_response())
}
