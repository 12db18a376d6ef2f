//! # Files API Handlers
//!
//! Upload, list, fetch and download tenant files. Every lookup is scoped to the
//! caller's tenant; other tenants' files answer 404.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::counter;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ApiError, bad_request, internal_error, not_found};
use crate::models::file::{FileResponse, FileType, Model as FileModel};
use crate::repositories::{FileRepository, NewFile};
use crate::server::AppState;
use crate::storage::{self, BlobStore};

/// Multipart field carrying the file.
pub const UPLOAD_FIELD: &str = "uploaded_file";

pub const CSV_MIME: &str = "text/csv";
pub const XLS_MIME: &str = "application/vnd.ms-excel";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const OCTET_STREAM_MIME: &str = "application/octet-stream";

const ALLOWED_UPLOAD_TYPES: &[&str] = &[CSV_MIME, XLS_MIME, XLSX_MIME];

/// Everything except RFC 3986 unreserved characters gets encoded.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Multipart body accepted by the upload endpoint
#[derive(Debug, ToSchema)]
pub struct UploadFileForm {
    /// CSV or Excel file
    #[schema(value_type = String, format = Binary)]
    pub uploaded_file: Vec<u8>,
}

/// Upload a spreadsheet
#[utoipa::path(
    post,
    path = "/api/files/upload",
    security(("bearer_auth" = [])),
    request_body(content = UploadFileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = FileResponse),
        (status = 400, description = "Missing file, unsupported type or too large", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError)
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<FileResponse>, ApiError> {
    let (filename, content_type, data) = loop {
        let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? else {
            return Err(bad_request("Missing uploaded_file field"));
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ALLOWED_UPLOAD_TYPES.contains(&content_type.as_str()) {
            return Err(bad_request("Unsupported file type"));
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| bad_request("Uploaded file has no filename"))?;

        let data = field.bytes().await.map_err(multipart_rejection)?;
        break (filename, content_type, data);
    };

    if data.len() as u64 > state.config.max_upload_bytes {
        return Err(bad_request("File too large"));
    }

    let store = require_storage(&state)?;
    let file_id = Uuid::new_v4();
    let blob_path = storage::upload_blob_path(user.tenant_id, file_id, &filename);
    let size_bytes = data.len() as i64;

    store
        .put(&blob_path, data, &content_type)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, blob_path = %blob_path, "Blob upload failed");
            internal_error("Blob upload failed")
        })?;
    let object_url = store.object_url(&blob_path);

    let file = FileRepository::new(&state.db)
        .create_file(NewFile {
            id: file_id,
            tenant_id: user.tenant_id,
            uploaded_by: user.id,
            file_type: FileType::detect(&filename),
            original_name: filename,
            blob_path,
            size_bytes,
        })
        .await?;

    counter!("files_uploaded_total").increment(1);
    tracing::info!(
        file_id = %file.id,
        tenant_id = %user.tenant_id,
        size_bytes,
        object_url = %object_url,
        "Stored uploaded file"
    );

    Ok(Json(file.into()))
}

/// List the caller's files, newest first
#[utoipa::path(
    get,
    path = "/api/files/",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Files of the caller's tenant", body = Vec<FileResponse>),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let files = FileRepository::new(&state.db)
        .list_for_tenant(user.tenant_id)
        .await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

/// Fetch one file's metadata
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 404, description = "File not found", body = ApiError)
    ),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let file = find_tenant_file(&state, &user, &file_id).await?;
    Ok(Json(file.into()))
}

/// Download a file's original bytes
#[utoipa::path(
    get,
    path = "/api/files/{id}/download",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "File not found", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError)
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let file = find_tenant_file(&state, &user, &file_id).await?;
    let data = read_blob(&state, &file).await?;

    let disposition = HeaderValue::from_str(&content_disposition_attachment(&file.original_name))
        .map_err(|_| internal_error("Download failed"))?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(media_type_for(&file.original_name)),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

/// Resolve `file_id` within the caller's tenant; malformed ids are simply not found.
pub(crate) async fn find_tenant_file(
    state: &AppState,
    user: &CurrentUser,
    file_id: &str,
) -> Result<FileModel, ApiError> {
    let file_id = Uuid::parse_str(file_id).map_err(|_| not_found("File not found"))?;
    Ok(FileRepository::new(&state.db)
        .require_for_tenant(user.tenant_id, file_id)
        .await?)
}

pub(crate) fn require_storage(state: &AppState) -> Result<&Arc<dyn BlobStore>, ApiError> {
    state
        .storage
        .as_ref()
        .ok_or_else(|| internal_error("Storage not configured"))
}

pub(crate) async fn read_blob(state: &AppState, file: &FileModel) -> Result<Bytes, ApiError> {
    let store = require_storage(state)?;
    store.get(&file.blob_path).await.map_err(|err| {
        tracing::error!(error = %err, blob_path = %file.blob_path, "Blob read failed");
        internal_error("Blob load failed")
    })
}

fn multipart_rejection(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        bad_request("File too large")
    } else {
        bad_request(&format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Media type served for a download, by filename extension.
pub fn media_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        CSV_MIME
    } else if lower.ends_with(".xlsx") {
        XLSX_MIME
    } else if lower.ends_with(".xls") {
        XLS_MIME
    } else {
        OCTET_STREAM_MIME
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
pub fn content_disposition_attachment(filename: &str) -> String {
    let name: String = if filename.is_empty() { "download" } else { filename }
        .chars()
        .filter(|c| *c != '"')
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();

    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ' ' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let fallback = match fallback.trim() {
        "" => "download",
        trimmed => trimmed,
    };

    let encoded = utf8_percent_encode(&name, FILENAME_ENCODE_SET);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
