use std::path::PathBuf;

use axum::Json;
use filebridge_core::files::local::{self, resolve_local_path, LocalInfo};

use crate::protocol::errors::ApiError;
use crate::protocol::messages::{
    ApiJson, ApiQuery, ListResponse, LocalDeleteRequest, LocalMkdirRequest, LocalPathQuery,
    LocalRenameRequest, SuccessResponse,
};

/// `GET /api/local/list?path`, defaulting to the home directory.
pub async fn list(ApiQuery(query): ApiQuery<LocalPathQuery>) -> Result<Json<ListResponse>, ApiError> {
    let path = resolve_local_path(query.path.as_deref());
    let items = local::list_dir(&path).await.map_err(ApiError::Local)?;
    Ok(Json(ListResponse {
        parent: local::local_parent(&path),
        path: path.to_string_lossy().to_string(),
        items,
    }))
}

/// `GET /api/local/info?path`
pub async fn info(ApiQuery(query): ApiQuery<LocalPathQuery>) -> Result<Json<LocalInfo>, ApiError> {
    let path = resolve_local_path(query.path.as_deref());
    let info = local::stat(&path).await.map_err(ApiError::Local)?;
    Ok(Json(info))
}

/// `POST /api/local/mkdir`
pub async fn mkdir(ApiJson(req): ApiJson<LocalMkdirRequest>) -> Result<Json<SuccessResponse>, ApiError> {
    let path = required_path(&req.dir_path)?;
    local::create_dir_all(&path).await.map_err(ApiError::Local)?;
    Ok(Json(SuccessResponse::ok()))
}

/// `POST /api/local/delete`
pub async fn delete(ApiJson(req): ApiJson<LocalDeleteRequest>) -> Result<Json<SuccessResponse>, ApiError> {
    let path = required_path(&req.file_path)?;
    local::remove(&path).await.map_err(ApiError::Local)?;
    Ok(Json(SuccessResponse::ok()))
}

/// `POST /api/local/rename`
pub async fn rename(ApiJson(req): ApiJson<LocalRenameRequest>) -> Result<Json<SuccessResponse>, ApiError> {
    let old_path = required_path(&req.old_path)?;
    let new_path = required_path(&req.new_path)?;
    local::rename(&old_path, &new_path)
        .await
        .map_err(ApiError::Local)?;
    Ok(Json(SuccessResponse::ok()))
}

/// Mutating endpoints never fall back to the home directory.
fn required_path(raw: &str) -> Result<PathBuf, ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::BadRequest("path is required".to_string()));
    }
    Ok(resolve_local_path(Some(raw)))
}
