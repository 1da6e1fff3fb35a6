use crate::api::error::AppError;
use crate::entities::stored_files;
use crate::services::ingest::IncomingFile;
use crate::services::trash::TrashService;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::Response,
};
use chrono::Utc;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct FileResponse {
    pub id: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub created_at: chrono::DateTime<Utc>,
    pub share_id: String,
    pub has_share_password: bool,
    pub trashed: bool,
}

impl From<stored_files::Model> for FileResponse {
    fn from(record: stored_files::Model) -> Self {
        Self {
            id: record.id,
            original_name: record.original_name,
            size_bytes: record.size_bytes,
            created_at: record.created_at,
            share_id: record.share_id,
            has_share_password: record.share_password_hash.is_some(),
            trashed: record.trashed,
        }
    }
}

/// Per-file upload result: exactly one of `file` or `error` is set
#[derive(Serialize, ToSchema)]
pub struct UploadOutcome {
    pub original_name: String,
    pub file: Option<FileResponse>,
    pub error: Option<String>,
}

#[utoipa::path(
    post,
    path = "/upload",
    responses(
        (status = 200, description = "Per-file upload outcomes", body = Vec<UploadOutcome>),
        (status = 400, description = "Empty or malformed upload"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn upload_files(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadOutcome>>, AppError> {
    let mut share_password: Option<String> = None;
    let mut incoming = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("share_password") {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?;
            if !value.is_empty() {
                share_password = Some(value);
            }
        } else if let Some(file_name) = field.file_name() {
            let original_name = file_name.to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?;
            incoming.push(IncomingFile {
                original_name,
                bytes,
            });
        }
    }

    let outcomes = state
        .ingest
        .ingest(&claims.sub, incoming, share_password.as_deref())
        .await?;

    let body = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(record) => UploadOutcome {
                original_name: outcome.original_name,
                file: Some(record.into()),
                error: None,
            },
            Err(e) => UploadOutcome {
                original_name: outcome.original_name,
                file: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Active files, newest first", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let records = TrashService::list(&state.db, &claims.sub, false).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/files/trash",
    responses(
        (status = 200, description = "Trashed files, newest first", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn list_trash(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let records = TrashService::list(&state.db, &claims.sub, true).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "File download stream"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Owned by another account"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let record = TrashService::find_owned(&state.db, &claims.sub, &file_id)
        .await?
        .ok_or(AppError::NotFound("File not found".to_string()))?;

    let file = state
        .vault
        .open(&record.owner_id, &record.stored_name)
        .await?;

    stream_attachment(file, &record.original_name, record.size_bytes)
}

#[utoipa::path(
    post,
    path = "/files/{id}/trash",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 204, description = "File moved to trash"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Owned by another account"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn trash_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, AppError> {
    TrashService::trash(&state.db, &claims.sub, &file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/files/{id}/restore",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 204, description = "File restored from trash"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Owned by another account"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn restore_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, AppError> {
    TrashService::restore(&state.db, &claims.sub, &file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 204, description = "File permanently deleted (idempotent)"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Owned by another account")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn purge_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, AppError> {
    TrashService::purge(&state.db, &state.vault, &claims.sub, &file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stream file bytes back as an attachment under its display name
pub(crate) fn stream_attachment(
    file: tokio::fs::File,
    original_name: &str,
    size_bytes: i64,
) -> Result<Response, AppError> {
    let encoded = utf8_percent_encode(original_name, NON_ALPHANUMERIC).to_string();
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        original_name.replace(['"', '\\'], "_"),
        encoded
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())
        .header(header::CONTENT_LENGTH, size_bytes)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(e.to_string()))
}
