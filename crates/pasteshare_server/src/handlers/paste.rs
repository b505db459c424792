//! Snippet paste HTTP handlers.

use super::client_origin;
use crate::{error::HttpError, models::paste::*, AppError, AppState};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::HeaderMap,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;

/// Body returned by every create endpoint.
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub key: String,
}

async fn create(
    state: AppState,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<CreatePasteRequest>, JsonRejection>,
    once: bool,
) -> Result<Json<CreatedResponse>, HttpError> {
    let Json(mut request) = payload.map_err(|rejection| {
        tracing::debug!("Rejected paste payload: {}", rejection);
        HttpError::bad_request(rejection.body_text())
    })?;
    request.once = once;

    let origin = client_origin(&headers, peer.as_ref());
    let key = state.service.create(request, &origin).await?;
    Ok(Json(CreatedResponse { key }))
}

/// Create a snippet paste.
///
/// # Errors
/// Returns 400 for invalid input and 500 for storage failures.
pub async fn create_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<CreatePasteRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, HttpError> {
    create(state, headers, peer, payload, false).await
}

/// Create a snippet paste that is deleted by its first read.
///
/// # Errors
/// Returns 400 for invalid input and 500 for storage failures.
pub async fn create_once_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<CreatePasteRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, HttpError> {
    create(state, headers, peer, payload, true).await
}

/// Read an entry by key.
///
/// Once-read attachments carry their bytes base64-encoded under `data`,
/// since their blobs are deleted as part of this request.
///
/// # Errors
/// Returns 404, 401 (wrong password), 423 (expired), or 500.
pub async fn get_paste(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<GetPasteQuery>,
) -> Result<Json<Value>, HttpError> {
    let content = state
        .service
        .get(&key, query.password.as_deref())
        .await?;
    Ok(Json(render_content(&content)?))
}

fn render_content(content: &PasteContent) -> Result<Value, HttpError> {
    let mut body = serde_json::to_value(content).map_err(|err| {
        tracing::error!("Failed to serialize paste content: {}", err);
        HttpError(AppError::Internal)
    })?;
    if let Some(rendered) = body.get_mut("attachments").and_then(Value::as_array_mut) {
        for (view, rendered) in content.attachments.iter().zip(rendered.iter_mut()) {
            if let (Some(bytes), Some(object)) = (&view.inline, rendered.as_object_mut()) {
                object.insert("data".to_string(), Value::String(BASE64.encode(bytes)));
            }
        }
    }
    Ok(body)
}
