//! Direct-upload URL minting and webhook notification relay.

#[path = "test_utils/mod.rs"]
mod test_utils;

use axum::http::StatusCode;
use test_utils::{TestApp, form_request, get_request, test_config};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOTIFY_FIELDS: &[(&str, &str)] = &[
    ("tenant_id", "acme"),
    ("blob_url", "https://bucket.example.com/tenant=acme/uploads/x.csv"),
    ("mime", "text/csv"),
    ("bytes", "42"),
    ("original_name", "x.csv"),
];

async fn app_with_webhook(server: &MockServer) -> TestApp {
    let mut config = test_config();
    config.webhook.url = Some(format!("{}/hook", server.uri()));
    config.webhook.secret = Some("s3cret".to_string());
    TestApp::with_config(config).await.unwrap()
}

#[tokio::test]
async fn test_ingest_page_is_served() {
    let app = TestApp::new().await.unwrap();

    let response = app.send_raw(get_request("/ingest", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
}

#[tokio::test]
async fn test_sas_mints_upload_url() {
    let app = TestApp::new().await.unwrap();

    let (status, body) = app
        .send(form_request(
            "/api/sas",
            &[
                ("tenant_id", "acme"),
                ("filename", "Q1 sales.csv"),
                ("mime", "text/csv"),
                ("bytes", "1024"),
            ],
        ))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let blob_url = body["blobUrl"].as_str().unwrap();
    assert!(blob_url.starts_with("memory://tenant=acme/uploads/"));
    assert!(body["uploadUrl"].as_str().unwrap().starts_with(blob_url));
    assert_eq!(app.store.call_count(), 1);
}

#[tokio::test]
async fn test_sas_rejects_oversized_declaration_before_touching_storage() {
    let app = TestApp::new().await.unwrap();
    let too_big = (50 * 1024 * 1024 + 1).to_string();

    let (status, body) = app
        .send(form_request(
            "/api/sas",
            &[("tenant_id", "acme"), ("filename", "big.csv"), ("bytes", &too_big)],
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File too large");
    assert_eq!(app.store.call_count(), 0);
}

#[tokio::test]
async fn test_sas_rejects_path_like_tenant_id() {
    let app = TestApp::new().await.unwrap();

    let (status, body) = app
        .send(form_request(
            "/api/sas",
            &[("tenant_id", "../other"), ("filename", "x.csv")],
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid tenant_id");
    assert_eq!(app.store.call_count(), 0);
}

#[tokio::test]
async fn test_sas_without_storage_fails() {
    let app = TestApp::new().await.unwrap().without_storage();

    let (status, body) = app
        .send(form_request(
            "/api/sas",
            &[("tenant_id", "acme"), ("filename", "x.csv")],
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Storage not configured");
}

#[tokio::test]
async fn test_notify_delivers_with_secret_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("X-Webhook-Secret", "s3cret"))
        .and(body_partial_json(serde_json::json!({
            "tenant_id": "acme",
            "bytes": 42,
            "original_name": "x.csv",
            "tags": []
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_with_webhook(&server).await;

    let (status, body) = app.send(form_request("/api/notify", NOTIFY_FIELDS)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["webhook_status"], 200);
}

#[tokio::test]
async fn test_notify_retries_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_with_webhook(&server).await;

    let (status, body) = app.send(form_request("/api/notify", NOTIFY_FIELDS)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_notify_gives_up_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500).set_body_string("still down"))
        .expect(3)
        .mount(&server)
        .await;
    let app = app_with_webhook(&server).await;

    let (status, body) = app.send(form_request("/api/notify", NOTIFY_FIELDS)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["details"]["webhook_status"], 500);
    assert_eq!(body["details"]["body"], "still down");
}

#[tokio::test]
async fn test_notify_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_with_webhook(&server).await;

    let (status, body) = app.send(form_request("/api/notify", NOTIFY_FIELDS)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["details"]["webhook_status"], 400);
}

#[tokio::test]
async fn test_notify_without_webhook_url_fails() {
    let app = TestApp::new().await.unwrap();

    let (status, body) = app.send(form_request("/api/notify", NOTIFY_FIELDS)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Webhook URL not configured");
}
