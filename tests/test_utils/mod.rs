//! Shared fixtures for integration tests.
//!
//! Builds an in-memory SQLite database with migrations applied and an app
//! wired to a [`MemoryBlobStore`], then drives it with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use beam_analytics::{
    config::AppConfig,
    db,
    server::{AppState, create_app},
    storage::{BlobStore, MemoryBlobStore},
    webhook::WebhookRelay,
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";
const BOUNDARY: &str = "beam-test-boundary";

/// Configuration for an isolated test instance.
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        ..Default::default()
    }
}

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = db::init_pool(&test_config()).await?;
    db::run_migrations(&db).await?;
    Ok(db)
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryBlobStore>,
}

impl TestApp {
    /// App with default test configuration and an in-memory blob store.
    pub async fn new() -> Result<Self> {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Result<Self> {
        let db = setup_test_db().await?;
        let store = Arc::new(MemoryBlobStore::new());
        let relay = WebhookRelay::new(&config.webhook)?.with_backoff_step(Duration::from_millis(5));

        let mut state = AppState::new(config, db, Some(store.clone() as Arc<dyn BlobStore>))?;
        state.webhook = Arc::new(relay);

        Ok(Self { state, store })
    }

    /// Same app with no object store configured.
    pub fn without_storage(mut self) -> Self {
        self.state.storage = None;
        self
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send_raw(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn send_raw(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }

    /// Register a tenant and return its access token.
    pub async fn register(&self, email: &str, tenant_name: &str) -> String {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/auth/register",
                None,
                json!({"email": email, "password": PASSWORD, "tenant_name": tenant_name}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Upload `data` through the API and return the created file's id.
    pub async fn upload(&self, token: &str, filename: &str, content_type: &str, data: &[u8]) -> String {
        let (status, body) = self
            .send(upload_request(token, filename, content_type, data))
            .await;
        assert_eq!(status, StatusCode::OK, "upload failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                url::form_urlencoded::byte_serialize(key.as_bytes()).collect::<String>(),
                url::form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub fn upload_request(token: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"uploaded_file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/files/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub const SALES_CSV: &str = "\
region,units,price
north,3,2.5
south,5,4
north,7,1.5
east,,3
";
