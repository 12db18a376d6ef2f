//! Upload, listing, tenant scoping and download through the HTTP API.

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;

use axum::http::{StatusCode, header};
use beam_analytics::storage::MemoryBlobStore;
use test_utils::{SALES_CSV, TestApp, get_request, test_config, upload_request};

const CSV: &str = "text/csv";

#[tokio::test]
async fn test_upload_then_list_and_get() {
    let app = TestApp::new().await.unwrap();
    let token = app.register("owner@example.com", "Acme").await;

    let (status, body) = app
        .send(upload_request(&token, "sales.csv", CSV, SALES_CSV.as_bytes()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["original_name"], "sales.csv");
    assert_eq!(body["size_bytes"], SALES_CSV.len());
    let file_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(app.store.len().await, 1);

    for uri in ["/api/files", "/api/files/"] {
        let (status, body) = app.send(get_request(uri, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        let files = body.as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["id"], file_id.as_str());
    }

    let (status, body) = app
        .send(get_request(&format!("/api/files/{file_id}"), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], file_id.as_str());
}

#[tokio::test]
async fn test_files_are_scoped_to_tenant() {
    let app = TestApp::new().await.unwrap();
    let owner = app.register("owner@example.com", "Acme").await;
    let other = app.register("someone@example.com", "Globex").await;
    let file_id = app.upload(&owner, "sales.csv", CSV, SALES_CSV.as_bytes()).await;

    let (status, body) = app.send(get_request("/api/files", Some(&other))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    for uri in [
        format!("/api/files/{file_id}"),
        format!("/api/files/{file_id}/download"),
    ] {
        let (status, _) = app.send(get_request(&uri, Some(&other))).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_malformed_file_id_is_not_found() {
    let app = TestApp::new().await.unwrap();
    let token = app.register("owner@example.com", "Acme").await;

    let (status, _) = app
        .send(get_request("/api/files/not-a-uuid", Some(&token)))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_returns_original_bytes() {
    let app = TestApp::new().await.unwrap();
    let token = app.register("owner@example.com", "Acme").await;
    let file_id = app
        .upload(&token, "Q1 sales.csv", CSV, SALES_CSV.as_bytes())
        .await;

    let response = app
        .send_raw(get_request(
            &format!("/api/files/{file_id}/download"),
            Some(&token),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], CSV);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"Q1 sales.csv\""));
    assert!(disposition.contains("filename*=UTF-8''Q1%20sales.csv"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], SALES_CSV.as_bytes());
}

#[tokio::test]
async fn test_upload_rejects_unsupported_type() {
    let app = TestApp::new().await.unwrap();
    let token = app.register("owner@example.com", "Acme").await;

    let (status, body) = app
        .send(upload_request(&token, "notes.txt", "text/plain", b"hello"))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unsupported file type");
    assert_eq!(app.store.call_count(), 0);
}

#[tokio::test]
async fn test_upload_rejects_oversized_file() {
    let mut config = test_config();
    config.max_upload_bytes = 16;
    let app = TestApp::with_config(config).await.unwrap();
    let token = app.register("owner@example.com", "Acme").await;

    let (status, body) = app
        .send(upload_request(&token, "sales.csv", CSV, SALES_CSV.as_bytes()))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File too large");
    assert_eq!(app.store.call_count(), 0);
}

#[tokio::test]
async fn test_upload_without_storage_fails() {
    let app = TestApp::new().await.unwrap().without_storage();
    let token = app.register("owner@example.com", "Acme").await;

    let (status, body) = app
        .send(upload_request(&token, "sales.csv", CSV, SALES_CSV.as_bytes()))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Storage not configured");
}

#[tokio::test]
async fn test_download_with_missing_blob_fails() {
    let mut app = TestApp::new().await.unwrap();
    let token = app.register("owner@example.com", "Acme").await;
    let file_id = app.upload(&token, "sales.csv", CSV, SALES_CSV.as_bytes()).await;

    // Metadata survives while the object store has lost the bytes
    app.state.storage = Some(Arc::new(MemoryBlobStore::new()));

    let (status, body) = app
        .send(get_request(
            &format!("/api/files/{file_id}/download"),
            Some(&token),
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Blob load failed");
}
