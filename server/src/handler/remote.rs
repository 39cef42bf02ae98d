use axum::extract::State;
use axum::Json;
use filebridge_core::config::parse_mode;
use filebridge_core::errors::FileError;
use filebridge_core::files::utils::remote_parent;

use crate::protocol::errors::ApiError;
use crate::protocol::messages::{
    ApiJson, ApiQuery, ListResponse, RemoteChmodRequest, RemoteDeleteRequest, RemoteListQuery,
    RemoteMkdirRequest, RemoteRenameRequest, SuccessResponse,
};
use crate::state::AppState;

/// `GET /api/remote/list?connId&path`
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RemoteListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let session = state.registry.get(&query.conn_id).await?;
    let path = query
        .path
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "/".to_string());

    let listing = session.adapter().list(&path).await?;
    Ok(Json(ListResponse {
        parent: remote_parent(&listing.path),
        path: listing.path,
        items: listing.entries,
    }))
}

/// `POST /api/remote/mkdir`
pub async fn mkdir(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RemoteMkdirRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let session = state.registry.get(&req.conn_id).await?;
    session.adapter().make_directory(&req.dir_path).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// `POST /api/remote/delete`
pub async fn delete(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RemoteDeleteRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let session = state.registry.get(&req.conn_id).await?;
    session
        .adapter()
        .remove(&req.file_path, req.is_directory)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// `POST /api/remote/rename`
pub async fn rename(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RemoteRenameRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let session = state.registry.get(&req.conn_id).await?;
    session.adapter().rename(&req.old_path, &req.new_path).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// `POST /api/remote/chmod`. FTP sessions are refused before the mode is
/// even parsed.
pub async fn chmod(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RemoteChmodRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let session = state.registry.get(&req.conn_id).await?;
    if session.kind.is_ftp_family() {
        return Err(FileError::NotSupported("chmod".to_string()).into());
    }
    let mode = parse_mode(&req.mode)?;
    session
        .adapter()
        .change_permissions(&req.file_path, mode)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
