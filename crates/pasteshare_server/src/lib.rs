//! HTTP server wiring for PasteShare (routes, handlers, and shared state).

/// HTTP error mapping for API handlers.
pub mod error;
/// HTTP handlers for paste, image, and blob endpoints.
pub mod handlers;

pub use pasteshare_core::{
    blob, config, models, AppError, Config, Database, EntryStore, OrphanSweeper, PasteService,
    DEFAULT_PORT,
};

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, Request},
    routing::{get, post},
    Router,
};
use hyper::HeaderMap;
use pasteshare_core::blob::{BlobStore, LocalBlobStore, UrlSigner};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Headroom on top of attachment bytes for multipart framing and text fields.
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: PasteService,
    pub blobs: Arc<dyn BlobStore>,
    pub signer: UrlSigner,
    pub config: Arc<Config>,
}

impl AppState {
    /// Construct shared state with a [`LocalBlobStore`] rooted at `config.blob_dir`.
    ///
    /// # Errors
    /// Returns an error if the blob directory cannot be created.
    pub fn new(config: Config, db: Database) -> Result<Self, AppError> {
        let signer = UrlSigner::new(&config.url_signing_key);
        let blobs = LocalBlobStore::new(
            config.blob_dir.as_str(),
            &config.public_base_url,
            signer.clone(),
        )
        .map_err(|err| {
            AppError::StorageMessage(format!(
                "Failed to open blob directory '{}': {}",
                config.blob_dir, err
            ))
        })?;
        Ok(Self::with_blob_store(config, db, Arc::new(blobs)))
    }

    /// Construct shared state over an explicit blob store.
    pub fn with_blob_store(config: Config, db: Database, blobs: Arc<dyn BlobStore>) -> Self {
        let store = EntryStore::new(Arc::new(db.entries));
        let service = PasteService::from_config(store, blobs.clone(), &config);
        Self {
            service,
            blobs,
            signer: UrlSigner::new(&config.url_signing_key),
            config: Arc::new(config),
        }
    }

    /// Sweeper over this state's entry store and blob store.
    pub fn orphan_sweeper(&self) -> OrphanSweeper {
        OrphanSweeper::new(
            self.service.store().clone(),
            self.blobs.clone(),
            self.config.sweep_grace(),
        )
    }

    fn body_limit(&self) -> usize {
        let limits = &self.config.limits;
        let attachments = limits
            .max_attachment_bytes
            .saturating_mul(limits.max_attachment_count as u64);
        usize::try_from(attachments)
            .unwrap_or(usize::MAX)
            .saturating_add(BODY_LIMIT_HEADROOM)
    }
}

/// Create the application router with all routes and middleware.
///
/// # Panics
/// Panics if static header values fail to parse (should not happen).
pub fn create_app(state: AppState, allow_public_access: bool) -> Router {
    let cors_port = state.config.port;
    create_app_with_cors_port(state, allow_public_access, cors_port)
}

/// Resolve the listener address from `BIND` and the public-access policy.
///
/// # Returns
/// A socket address that stays on loopback unless public access is enabled.
pub fn resolve_bind_address(config: &Config, allow_public_access: bool) -> SocketAddr {
    let default_bind = SocketAddr::from(([127, 0, 0, 1], config.port));
    let requested = match std::env::var("BIND") {
        Ok(value) => match value.trim().parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::warn!(
                    "Invalid BIND='{}': {}. Falling back to {}",
                    value,
                    err,
                    default_bind
                );
                default_bind
            }
        },
        Err(_) => default_bind,
    };

    if allow_public_access || requested.ip().is_loopback() {
        return requested;
    }

    tracing::warn!(
        "Non-loopback bind {} requested without ALLOW_PUBLIC_ACCESS; forcing 127.0.0.1",
        requested
    );
    SocketAddr::from(([127, 0, 0, 1], requested.port()))
}

fn create_app_with_cors_port(state: AppState, allow_public_access: bool, cors_port: u16) -> Router {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(header::X_CONTENT_TYPE_OPTIONS, "nosniff".parse().unwrap());
    default_headers.insert(header::X_FRAME_OPTIONS, "DENY".parse().unwrap());
    default_headers.insert(
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; img-src 'self' data:; frame-ancestors 'none'"
            .parse()
            .unwrap(),
    );

    let methods = [axum::http::Method::GET, axum::http::Method::POST];
    let cors = if allow_public_access {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        CorsLayer::new()
            .allow_origin([
                format!("http://localhost:{}", cors_port).parse().unwrap(),
                format!("http://127.0.0.1:{}", cors_port).parse().unwrap(),
            ])
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    };

    let body_limit = state.body_limit();
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/paste", post(handlers::paste::create_paste))
        .route("/v1/paste/once", post(handlers::paste::create_once_paste))
        .route("/v1/paste/:key", get(handlers::paste::get_paste))
        .route("/v1/image", post(handlers::image::create_image_paste))
        .route(
            "/v1/image/once",
            post(handlers::image::create_once_image_paste),
        )
        .route("/v1/blob/:object_key", get(handlers::blob::serve_blob))
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(CompressionLayer::new())
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    default_headers
                        .get(header::CONTENT_SECURITY_POLICY)
                        .unwrap()
                        .clone(),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    default_headers
                        .get(header::X_CONTENT_TYPE_OPTIONS)
                        .unwrap()
                        .clone(),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    default_headers
                        .get(header::X_FRAME_OPTIONS)
                        .unwrap()
                        .clone(),
                )),
        )
}

/// Span for one request, tagged with the id assigned by [`SetRequestIdLayer`].
fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

fn listener_cors_port(listener: &tokio::net::TcpListener, fallback_port: u16) -> u16 {
    listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(fallback_port)
}

/// Run the Axum server with graceful shutdown support.
///
/// Peer addresses are exposed to handlers so entries can record their
/// client origin.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    allow_public_access: bool,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let cors_port = listener_cors_port(&listener, state.config.port);
    let app = create_app_with_cors_port(state, allow_public_access, cors_port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
}
