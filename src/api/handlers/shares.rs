use crate::api::error::AppError;
use crate::services::share::ShareService;
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ShareQuery {
    pub password: Option<String>,
}

/// Anonymous download via an unguessable share token. No session required.
#[utoipa::path(
    get,
    path = "/share/{share_id}",
    params(
        ("share_id" = String, Path, description = "Share token"),
        ("password" = Option<String>, Query, description = "Share password, if the file has one")
    ),
    responses(
        (status = 200, description = "File download stream"),
        (status = 401, description = "Wrong or missing share password"),
        (status = 404, description = "Unknown share token")
    ),
    tag = "shares"
)]
pub async fn resolve_share(
    State(state): State<crate::AppState>,
    Path(share_id): Path<String>,
    Query(query): Query<ShareQuery>,
) -> Result<Response, AppError> {
    let resolved = ShareService::resolve_public(
        &state.db,
        &state.vault,
        &share_id,
        query.password.as_deref(),
    )
    .await?;

    super::files::stream_attachment(resolved.file, &resolved.original_name, resolved.size_bytes)
}
