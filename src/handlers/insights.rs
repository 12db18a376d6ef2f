//! # Insights API Handlers

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::{ApiError, bad_request, internal_error};
use crate::handlers::files::{find_tenant_file, read_blob};
use crate::insights::{self, InsightsReport, LoadError, Table};
use crate::models::file::Model as FileModel;
use crate::server::AppState;
use crate::summary::{DatasetProfile, SummaryError};

/// Optional body of the insights endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InsightsRequest {
    /// Column → value; `null`, `""` and `"all"` leave the column unfiltered
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filters: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SummaryResponse {
    pub summary: String,
}

/// Compute KPIs, statistics, charts and filter options for a file
#[utoipa::path(
    post,
    path = "/api/files/{id}/insights",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "File id")),
    request_body(content = Option<InsightsRequest>, description = "Optional filters"),
    responses(
        (status = 200, description = "Insights payload", body = InsightsReport),
        (status = 400, description = "Unsupported file type", body = ApiError),
        (status = 404, description = "File not found", body = ApiError),
        (status = 500, description = "Blob load failed", body = ApiError)
    ),
    tag = "insights"
)]
pub async fn file_insights(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(file_id): Path<String>,
    body: Result<Option<Json<InsightsRequest>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let filters = body?.map(|Json(request)| request.filters).unwrap_or_default();
    let file = find_tenant_file(&state, &user, &file_id).await?;

    let payload = run_blocking(&state, file, move |table| {
        let report = insights::generate_insights(&table, &filters);
        insights::sanitize_json(&report)
            .map_err(|err| internal_error(&format!("Failed to encode insights: {err}")))
    })
    .await?;

    Ok(Json(payload))
}

/// Ask the configured AI provider to describe a file
#[utoipa::path(
    post,
    path = "/api/files/{id}/ai-summary",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Prose summary", body = SummaryResponse),
        (status = 404, description = "File not found", body = ApiError),
        (status = 500, description = "AI summary not configured or failed", body = ApiError)
    ),
    tag = "insights"
)]
pub async fn ai_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(file_id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let file = find_tenant_file(&state, &user, &file_id).await?;
    let summarizer = state
        .summarizer
        .clone()
        .ok_or(SummaryError::NotConfigured)?;

    let profile = run_blocking(&state, file, |table| Ok(DatasetProfile::from_table(&table))).await?;
    let summary = summarizer.summarize(&profile).await?;

    Ok(Json(SummaryResponse { summary }))
}

/// Load the file's table and run `work` on the blocking pool.
async fn run_blocking<T, F>(state: &AppState, file: FileModel, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(Table) -> Result<T, ApiError> + Send + 'static,
{
    let data = read_blob(state, &file).await?;
    let blob_path = file.blob_path;

    tokio::task::spawn_blocking(move || {
        let table = insights::load_clean_table(&blob_path, &data).map_err(load_rejection)?;
        work(table)
    })
    .await
    .map_err(|err| internal_error(&format!("Insights task failed: {err}")))?
}

fn load_rejection(err: LoadError) -> ApiError {
    match err {
        LoadError::UnsupportedType(_) => bad_request("Unsupported file type"),
        other => {
            tracing::warn!(error = %other, "Failed to load table");
            internal_error("Blob load failed")
        }
    }
}
