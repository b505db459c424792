//! Shared integration-test server bootstrap helpers.

use axum_test::TestServer;
use pasteshare_core::config::Limits;
use pasteshare_server::{create_app, AppState, Config, Database};
use std::path::Path;
use tempfile::TempDir;

pub(crate) const PUBLIC_BASE_URL: &str = "http://localhost:38420";

pub(crate) fn test_config_for_dir(dir: &Path) -> Config {
    Config {
        db_path: dir.join("db").to_str().expect("db path").to_string(),
        blob_dir: dir.join("blobs").to_str().expect("blob path").to_string(),
        port: 0,
        public_base_url: PUBLIC_BASE_URL.to_string(),
        url_signing_key: "integration-secret".to_string(),
        limits: Limits::default(),
        sweep_interval_secs: 600,
        sweep_grace_secs: 600,
        signed_url_ttl_secs: 300,
    }
}

pub(crate) fn test_server_for_config(config: Config) -> TestServer {
    let db = Database::new(config.db_path.as_str()).expect("open db");
    let state = AppState::new(config, db).expect("state");
    let app = create_app(state, false);
    TestServer::new(app).expect("server")
}

pub(crate) fn setup_test_server() -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config_for_dir(temp_dir.path());
    (test_server_for_config(config), temp_dir)
}

/// Files currently stored in the blob directory.
pub(crate) fn blob_files(temp_dir: &TempDir) -> Vec<String> {
    let dir = temp_dir.path().join("blobs");
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("blob dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Path and query of a signed link, for replaying it against the test server.
pub(crate) fn signed_path(url: &str) -> String {
    url.strip_prefix(PUBLIC_BASE_URL)
        .expect("link uses the public base url")
        .to_string()
}

pub(crate) fn svg_bytes(width: u32, height: u32) -> Vec<u8> {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><rect width="1" height="1"/></svg>"#
    )
    .into_bytes()
}
