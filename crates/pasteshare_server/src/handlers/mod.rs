//! HTTP request handlers.

/// Signed blob download endpoint.
pub mod blob;
/// Multipart image paste endpoints.
pub mod image;
/// Snippet paste endpoints and entry retrieval.
pub mod paste;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Liveness probe.
pub async fn health() -> &'static str {
    "paste ok!"
}

/// Best-effort client address for the entry's `client_origin`.
///
/// Prefers the first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer.
pub(crate) fn client_origin(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
