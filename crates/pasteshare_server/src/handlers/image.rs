//! Multipart image paste handlers.

use super::{client_origin, paste::CreatedResponse};
use crate::{error::HttpError, models::paste::*, AppState};
use axum::{
    extract::{ConnectInfo, Multipart, State},
    http::HeaderMap,
    Json,
};
use std::net::SocketAddr;

const FILE_FIELDS: [&str; 2] = ["images", "images[]"];

/// Collect the multipart form into a create request.
async fn read_form(mut multipart: Multipart) -> Result<CreatePasteRequest, HttpError> {
    let mut request = CreatePasteRequest::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| HttpError::bad_request(err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if FILE_FIELDS.contains(&name.as_str()) {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|err| HttpError::bad_request(err.body_text()))?;
            let mut file = IncomingFile::new(filename, bytes.to_vec());
            file.content_type = content_type;
            request.files.push(file);
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|err| HttpError::bad_request(err.body_text()))?;
        match name.as_str() {
            "title" => request.title = Some(value),
            "description" => request.description = Some(value),
            "password" => request.password = Some(value),
            "expire_after" => {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    request.expire_after = Some(trimmed.parse().map_err(|_| {
                        HttpError::bad_request("expire_after must be a number of seconds")
                    })?);
                }
            }
            other => tracing::debug!("Ignoring unknown multipart field '{}'", other),
        }
    }
    Ok(request)
}

async fn create(
    state: AppState,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    multipart: Multipart,
    once: bool,
) -> Result<Json<CreatedResponse>, HttpError> {
    let mut request = read_form(multipart).await?;
    if request.files.is_empty() {
        return Err(HttpError::bad_request("no images were uploaded"));
    }
    request.once = once;

    let origin = client_origin(&headers, peer.as_ref());
    let key = state.service.create(request, &origin).await?;
    Ok(Json(CreatedResponse { key }))
}

/// Create an image paste from a multipart form.
///
/// # Errors
/// Returns 400 for invalid input and 500 for storage or upload failures.
pub async fn create_image_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    multipart: Multipart,
) -> Result<Json<CreatedResponse>, HttpError> {
    create(state, headers, peer, multipart, false).await
}

/// Create an image paste that is deleted by its first read.
///
/// # Errors
/// Returns 400 for invalid input and 500 for storage or upload failures.
pub async fn create_once_image_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    multipart: Multipart,
) -> Result<Json<CreatedResponse>, HttpError> {
    create(state, headers, peer, multipart, true).await
}
