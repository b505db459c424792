//! Integration tests for the PasteShare HTTP API.

mod support;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::time::Duration;
use support::{blob_files, setup_test_server, signed_path, svg_bytes};

async fn create_snippet_paste(server: &TestServer, route: &str, body: Value) -> String {
    let response = server.post(route).json(&body).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let created: Value = response.json();
    created["key"].as_str().expect("key").to_string()
}

fn svg_form(count: u32) -> MultipartForm {
    let mut form = MultipartForm::new().add_text("title", "diagram");
    for i in 1..=count {
        form = form.add_part(
            "images",
            Part::bytes(svg_bytes(10 * i, 20))
                .file_name(format!("shape{i}.svg"))
                .mime_type("image/svg+xml"),
        );
    }
    form
}

fn assert_error_code(response: &axum_test::TestResponse, status: StatusCode, code: &str) {
    assert_eq!(response.status_code(), status);
    let body: Value = response.json();
    assert_eq!(body["code"], code);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn test_health() {
    let (server, _temp) = setup_test_server();
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "paste ok!");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let (server, _temp) = setup_test_server();

    let generated = server.get("/health").await;
    let id = generated.header("x-request-id");
    assert!(!id.to_str().expect("ascii id").is_empty());

    let supplied = server
        .get("/v1/paste/doesnotexist0000")
        .add_header("x-request-id", "trace-me-42")
        .await;
    assert_eq!(supplied.status_code(), StatusCode::NOT_FOUND);
    supplied.assert_header("x-request-id", "trace-me-42");
}

#[tokio::test]
async fn test_snippet_paste_lifecycle() {
    let (server, _temp) = setup_test_server();

    let key = create_snippet_paste(
        &server,
        "/v1/paste",
        json!({ "snippets": [{ "language": "text", "content": "hello" }] }),
    )
    .await;
    assert_eq!(key.len(), 16);
    assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));

    for _ in 0..2 {
        let response = server.get(&format!("/v1/paste/{}", key)).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["key"], key.as_str());
        assert_eq!(
            body["snippets"],
            json!([{ "language": "text", "content": "hello" }])
        );
        assert_eq!(body["once"], false);
        assert!(body.get("client_origin").is_none());
        assert!(body.get("password_hash").is_none());
        assert!(body.get("expire_at").is_none());
    }
}

#[tokio::test]
async fn test_once_paste_is_served_once() {
    let (server, _temp) = setup_test_server();

    let key = create_snippet_paste(
        &server,
        "/v1/paste/once",
        json!({ "snippets": [{ "language": "text", "content": "secret" }] }),
    )
    .await;

    let first = server.get(&format!("/v1/paste/{}", key)).await;
    assert_eq!(first.status_code(), StatusCode::OK);
    let body: Value = first.json();
    assert_eq!(body["snippets"][0]["content"], "secret");
    assert_eq!(body["once"], true);

    let second = server.get(&format!("/v1/paste/{}", key)).await;
    assert_error_code(&second, StatusCode::NOT_FOUND, "not_found");
}

#[tokio::test]
async fn test_password_protected_paste() {
    let (server, _temp) = setup_test_server();

    let key = create_snippet_paste(
        &server,
        "/v1/paste",
        json!({
            "snippets": [{ "language": "rust", "content": "fn main() {}" }],
            "password": "hunter2"
        }),
    )
    .await;
    let path = format!("/v1/paste/{}", key);

    let missing = server.get(&path).await;
    assert_error_code(&missing, StatusCode::UNAUTHORIZED, "wrong_password");

    let wrong = server
        .get(&path)
        .add_query_param("password", "hunter3")
        .await;
    assert_error_code(&wrong, StatusCode::UNAUTHORIZED, "wrong_password");
    let body: Value = wrong.json();
    assert_eq!(body["message"], "incorrect password");

    let right = server
        .get(&path)
        .add_query_param("password", "hunter2")
        .await;
    assert_eq!(right.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_paste_reports_expired_after_password_check() {
    let (server, _temp) = setup_test_server();

    let key = create_snippet_paste(
        &server,
        "/v1/paste",
        json!({
            "snippets": [{ "language": "text", "content": "short lived" }],
            "password": "pw",
            "expire_after": 1
        }),
    )
    .await;
    let path = format!("/v1/paste/{}", key);

    let live = server.get(&path).add_query_param("password", "pw").await;
    assert_eq!(live.status_code(), StatusCode::OK);
    let body: Value = live.json();
    assert!(body["expire_at"].as_str().is_some());

    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let wrong = server.get(&path).add_query_param("password", "nope").await;
    assert_error_code(&wrong, StatusCode::UNAUTHORIZED, "wrong_password");

    let expired = server.get(&path).add_query_param("password", "pw").await;
    assert_error_code(&expired, StatusCode::LOCKED, "content_expired");
    let body: Value = expired.json();
    assert_eq!(body["message"], "the requested content has expired");
}

#[tokio::test]
async fn test_invalid_create_requests_are_rejected() {
    let (server, _temp) = setup_test_server();

    let empty = server.post("/v1/paste").json(&json!({})).await;
    assert_error_code(&empty, StatusCode::BAD_REQUEST, "invalid_input");

    let malformed = server
        .post("/v1/paste")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    assert_error_code(&malformed, StatusCode::BAD_REQUEST, "invalid_input");

    let too_long = "x".repeat(30_001);
    let oversized = server
        .post("/v1/paste")
        .json(&json!({ "snippets": [{ "language": "text", "content": too_long }] }))
        .await;
    assert_error_code(&oversized, StatusCode::BAD_REQUEST, "invalid_input");

    let unknown = server.get("/v1/paste/doesnotexist0000").await;
    assert_error_code(&unknown, StatusCode::NOT_FOUND, "not_found");
}

#[tokio::test]
async fn test_image_paste_serves_signed_blob_links() {
    let (server, temp) = setup_test_server();

    let response = server.post("/v1/image").multipart(svg_form(2)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let created: Value = response.json();
    let key = created["key"].as_str().expect("key");
    assert_eq!(blob_files(&temp).len(), 2);

    let body: Value = server.get(&format!("/v1/paste/{}", key)).await.json();
    assert_eq!(body["title"], "diagram");
    let attachments = body["attachments"].as_array().expect("attachments");
    assert_eq!(attachments.len(), 2);
    for attachment in attachments {
        assert_eq!(attachment["mime_type"], "image/svg+xml");
        assert_eq!(attachment["height"], 20);
        assert!(attachment.get("data").is_none());

        let url = attachment["url"].as_str().expect("url");
        let blob = server.get(&signed_path(url)).await;
        assert_eq!(blob.status_code(), StatusCode::OK);
        blob.assert_header("content-type", "image/svg+xml");
        assert!(blob.text().starts_with("<svg"));
    }

    let url = attachments[0]["url"].as_str().expect("url");
    let tampered = format!("{}0", signed_path(url));
    let rejected = server.get(&tampered).await;
    assert_eq!(rejected.status_code(), StatusCode::NOT_FOUND);

    let unsigned = signed_path(url);
    let unsigned = unsigned.split('?').next().expect("path");
    assert_eq!(server.get(unsigned).await.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_once_image_paste_inlines_and_deletes_blobs() {
    let (server, temp) = setup_test_server();

    let response = server.post("/v1/image/once").multipart(svg_form(1)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let created: Value = response.json();
    let key = created["key"].as_str().expect("key");

    let body: Value = server.get(&format!("/v1/paste/{}", key)).await.json();
    let attachment = &body["attachments"][0];
    assert!(attachment["data"].as_str().is_some_and(|data| !data.is_empty()));
    assert!(blob_files(&temp).is_empty());

    let url = attachment["url"].as_str().expect("url");
    assert_eq!(
        server.get(&signed_path(url)).await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server
            .get(&format!("/v1/paste/{}", key))
            .await
            .status_code(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_image_validation_failure_uploads_nothing() {
    let (server, temp) = setup_test_server();

    let form = svg_form(1).add_part(
        "images",
        Part::bytes(b"#!/bin/sh".to_vec())
            .file_name("evil.sh")
            .mime_type("text/plain"),
    );
    let response = server.post("/v1/image").multipart(form).await;
    assert_error_code(&response, StatusCode::BAD_REQUEST, "invalid_input");
    assert!(blob_files(&temp).is_empty());

    let mislabeled = MultipartForm::new().add_part(
        "images",
        Part::bytes(svg_bytes(10, 10))
            .file_name("shape.svg")
            .mime_type("image/png"),
    );
    let response = server.post("/v1/image").multipart(mislabeled).await;
    assert_error_code(&response, StatusCode::BAD_REQUEST, "invalid_input");
    assert!(blob_files(&temp).is_empty());

    let too_many = server.post("/v1/image").multipart(svg_form(4)).await;
    assert_error_code(&too_many, StatusCode::BAD_REQUEST, "invalid_input");
    assert!(blob_files(&temp).is_empty());

    let no_files = server
        .post("/v1/image")
        .multipart(MultipartForm::new().add_text("title", "nothing"))
        .await;
    assert_error_code(&no_files, StatusCode::BAD_REQUEST, "invalid_input");
}
