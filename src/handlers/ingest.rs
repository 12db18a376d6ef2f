//! # Ingest API Handlers
//!
//! Browser-facing ingest flow: mint a presigned upload URL, PUT the bytes
//! straight to object storage, then relay an upload notification to the
//! workflow webhook. None of these routes require a bearer token.

use std::time::Duration;

use axum::{
    Form, Json,
    extract::State,
    response::Html,
};
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, bad_request, internal_error};
use crate::handlers::files::require_storage;
use crate::server::AppState;
use crate::storage::sas_blob_name;
use crate::webhook::{RelayOutcome, UploadNotification};

const INGEST_PAGE: &str = include_str!("ingest.html");

/// Form body of `POST /api/sas`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SasForm {
    pub tenant_id: String,
    pub filename: String,
    #[serde(default = "default_mime")]
    #[schema(example = "application/octet-stream")]
    pub mime: String,
    /// Declared size of the upcoming upload
    #[serde(default)]
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SasResponse {
    /// Presigned PUT URL
    pub upload_url: String,
    /// Object address to pass to `/api/notify`
    pub blob_url: String,
}

/// Form body of `POST /api/notify`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotifyForm {
    pub tenant_id: String,
    pub blob_url: String,
    pub mime: String,
    pub bytes: u64,
    pub original_name: String,
}

fn default_mime() -> String {
    "application/octet-stream".to_string()
}

/// Ingest page
#[utoipa::path(
    get,
    path = "/ingest",
    responses((status = 200, description = "HTML ingest page", content_type = "text/html")),
    tag = "ingest"
)]
pub async fn ingest_page() -> Html<&'static str> {
    Html(INGEST_PAGE)
}

/// Mint a short-lived direct upload URL
#[utoipa::path(
    post,
    path = "/api/sas",
    request_body(content = SasForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Upload URL minted", body = SasResponse),
        (status = 400, description = "File too large or invalid tenant id", body = ApiError),
        (status = 500, description = "Storage not configured", body = ApiError)
    ),
    tag = "ingest"
)]
pub async fn mint_upload_url(
    State(state): State<AppState>,
    Form(form): Form<SasForm>,
) -> Result<Json<SasResponse>, ApiError> {
    let store = require_storage(&state)?;
    if form.bytes > state.config.max_upload_bytes {
        return Err(bad_request("File too large"));
    }
    if !is_valid_tenant_segment(&form.tenant_id) {
        return Err(bad_request("Invalid tenant_id"));
    }

    let blob_name = sas_blob_name(&form.tenant_id, &form.filename, Utc::now());
    let ttl = Duration::from_secs(state.config.storage.sas_ttl_minutes * 60);

    let presigned = store.presign_upload(&blob_name, ttl).await.map_err(|err| {
        tracing::error!(error = %err, backend = store.backend(), "Failed to mint upload URL");
        internal_error("Failed to mint upload URL")
    })?;

    counter!("ingest_upload_urls_total").increment(1);
    tracing::info!(
        tenant_id = %form.tenant_id,
        blob_name = %blob_name,
        mime = %form.mime,
        bytes = form.bytes,
        "Minted upload URL"
    );

    Ok(Json(SasResponse {
        upload_url: presigned.upload_url,
        blob_url: presigned.blob_url,
    }))
}

/// Relay an upload notification to the workflow webhook
#[utoipa::path(
    post,
    path = "/api/notify",
    request_body(content = NotifyForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Webhook accepted the notification", body = RelayOutcome),
        (status = 500, description = "Webhook URL not configured", body = ApiError),
        (status = 502, description = "Webhook rejected the notification or stayed unavailable", body = ApiError)
    ),
    tag = "ingest"
)]
pub async fn notify_upload(
    State(state): State<AppState>,
    Form(form): Form<NotifyForm>,
) -> Result<Json<RelayOutcome>, ApiError> {
    let notification = UploadNotification {
        tenant_id: form.tenant_id,
        blob_url: form.blob_url,
        mime: form.mime,
        bytes: form.bytes,
        original_name: form.original_name,
        tags: Vec::new(),
    };

    Ok(Json(state.webhook.relay(&notification).await?))
}

/// Tenant ids become a path segment of the blob name.
fn is_valid_tenant_segment(tenant_id: &str) -> bool {
    !tenant_id.is_empty()
        && tenant_id.len() <= 128
        && tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_segment_validation() {
        assert!(is_valid_tenant_segment("acme-01"));
        assert!(is_valid_tenant_segment("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_valid_tenant_segment(""));
        assert!(!is_valid_tenant_segment("../other"));
        assert!(!is_valid_tenant_segment("a/b"));
    }

    #[test]
    fn test_sas_response_uses_camel_case() {
        let json = serde_json::to_value(SasResponse {
            upload_url: "u".into(),
            blob_url: "b".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"uploadUrl": "u", "blobUrl": "b"}));
    }
}
