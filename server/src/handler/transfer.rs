use std::path::{Path, PathBuf};

use axum::extract::{Multipart, State};
use axum::Json;
use filebridge_core::files::local::resolve_local_path;
use filebridge_core::transfer::TransferRecord;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::protocol::errors::ApiError;
use crate::protocol::messages::{
    ApiJson, ClearResponse, DownloadRequest, TransferStarted, UploadLocalRequest,
};
use crate::state::AppState;

fn started(record: TransferRecord) -> Json<TransferStarted> {
    Json(TransferStarted {
        success: true,
        transfer_id: record.id,
    })
}

/// `POST /api/transfer/upload-local`: push a local file or directory.
pub async fn upload_local(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UploadLocalRequest>,
) -> Result<Json<TransferStarted>, ApiError> {
    if req.local_path.trim().is_empty() {
        return Err(ApiError::BadRequest("localPath is required".to_string()));
    }
    let local_path = resolve_local_path(Some(&req.local_path));
    let record = state
        .transfers
        .upload_local_path(&req.conn_id, &local_path, &req.remote_path)
        .await?;
    Ok(started(record))
}

/// `POST /api/transfer/download` (and `/download-dir`): pull a remote file
/// or directory into a local directory.
pub async fn download(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DownloadRequest>,
) -> Result<Json<TransferStarted>, ApiError> {
    if req.remote_path.trim().is_empty() {
        return Err(ApiError::BadRequest("remotePath is required".to_string()));
    }
    let local_dir = resolve_local_path(Some(&req.local_path));
    let record = state
        .transfers
        .download_remote_path(&req.conn_id, &req.remote_path, &local_dir)
        .await?;
    Ok(started(record))
}

/// `POST /api/transfer/upload`: multipart upload of a browser-supplied
/// file. The file is staged on disk, pushed, and the staged copy removed.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TransferStarted>, ApiError> {
    let mut conn_id = None;
    let mut remote_path = None;
    let mut staged: Option<(PathBuf, String)> = None;

    let parsed = async {
        while let Some(mut field) = multipart.next_field().await? {
            match field.name() {
                Some("connId") => conn_id = Some(field.text().await?),
                Some("remotePath") => remote_path = Some(field.text().await?),
                Some("file") => {
                    let file_name = field
                        .file_name()
                        .map(sanitize_file_name)
                        .filter(|n| !n.is_empty())
                        .ok_or_else(|| ApiError::BadRequest("file name is required".to_string()))?;
                    let path = staging_path(&state.upload_dir).await?;
                    // Record the path first so a failed write is still cleaned up.
                    staged = Some((path.clone(), file_name));
                    let mut out = tokio::fs::File::create(&path)
                        .await
                        .map_err(|e| stage_error(&path, e))?;
                    while let Some(chunk) = field.chunk().await? {
                        out.write_all(&chunk)
                            .await
                            .map_err(|e| stage_error(&path, e))?;
                    }
                    out.flush().await.map_err(|e| stage_error(&path, e))?;
                }
                _ => {}
            }
        }
        Ok::<(), ApiError>(())
    }
    .await;

    let result = match (parsed, conn_id, staged.as_ref()) {
        (Err(e), _, _) => Err(e),
        (Ok(()), None, _) => Err(ApiError::BadRequest("connId is required".to_string())),
        (Ok(()), _, None) => Err(ApiError::BadRequest("file is required".to_string())),
        (Ok(()), Some(conn_id), Some((path, file_name))) => {
            let remote_dir = remote_path.unwrap_or_else(|| "/".to_string());
            return state
                .transfers
                .upload_staged_file(&conn_id, path, file_name, &remote_dir)
                .await
                .map(started)
                .map_err(ApiError::from);
        }
    };

    if let Some((path, _)) = staged {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), "Failed to remove staged upload: {e}");
        }
    }
    result
}

/// `GET /api/transfers`
pub async fn list(State(state): State<AppState>) -> Json<Vec<TransferRecord>> {
    Json(state.queue.list().await)
}

/// `POST /api/transfers/clear`: drop finished records.
pub async fn clear(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.queue.clear().await;
    Json(ClearResponse {
        success: true,
        removed,
    })
}

async fn staging_path(upload_dir: &Path) -> Result<PathBuf, ApiError> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| stage_error(upload_dir, e))?;
    Ok(upload_dir.join(format!("upload-{}", uuid::Uuid::new_v4())))
}

fn stage_error(path: &Path, e: std::io::Error) -> ApiError {
    ApiError::Core(filebridge_core::errors::CoreError::Filesystem(format!(
        "stage {}: {e}",
        path.display()
    )))
}

/// Keep only the final path component of a client-supplied file name.
fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches("..")
        .to_string()
}
