//! Runs uploads and downloads against a registered session and keeps the
//! matching [`TransferRecord`] up to date.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::queue::TransferQueue;
use super::types::{TransferKind, TransferRecord};
use super::walker::DirectoryWalker;
use crate::connection::{ConnectionRegistry, Session};
use crate::errors::CoreError;
use crate::files::local;
use crate::files::utils::{join_remote_path, remote_file_name};

/// Local name used when downloading a remote root directory.
const ROOT_DOWNLOAD_NAME: &str = "root";

pub struct TransferService {
    registry: Arc<ConnectionRegistry>,
    queue: Arc<TransferQueue>,
}

impl TransferService {
    pub fn new(registry: Arc<ConnectionRegistry>, queue: Arc<TransferQueue>) -> Self {
        Self { registry, queue }
    }

    /// Upload a local file or directory into `remote_dir`.
    ///
    /// The target is `remote_dir/<name of local_path>`; directories are
    /// copied recursively. Session and local-path problems are reported
    /// before any record exists.
    pub async fn upload_local_path(
        &self,
        conn_id: &str,
        local_path: &Path,
        remote_dir: &str,
    ) -> Result<TransferRecord, CoreError> {
        let session = self.registry.get(conn_id).await?;
        let info = local::stat(local_path)
            .await
            .map_err(|e| CoreError::Filesystem(format!("stat {}: {e}", local_path.display())))?;

        let file_name = info.entry.name.clone();
        let remote_target = join_remote_path(remote_dir, &file_name);
        let record = TransferRecord::new(
            TransferKind::Upload,
            &file_name,
            &local_path.to_string_lossy(),
            &remote_target,
        );
        let record = if info.entry.is_directory {
            record.directory()
        } else {
            record.with_size(info.entry.size)
        };
        let record = self.queue.create(record).await;
        info!(
            transfer_id = %record.id,
            conn_id = %conn_id,
            local = %local_path.display(),
            remote = %remote_target,
            directory = record.is_directory,
            "Upload started"
        );

        let result = if record.is_directory {
            DirectoryWalker::new(session.adapter())
                .upload(local_path, &remote_target)
                .await
                .map(|summary| summary.bytes)
        } else {
            self.put(&session, local_path, &remote_target).await
        };
        self.finish(&record.id, result).await
    }

    /// Upload a file staged on local disk (for example a browser upload)
    /// under `file_name` in `remote_dir`. The staged file is deleted
    /// afterwards whatever the outcome.
    pub async fn upload_staged_file(
        &self,
        conn_id: &str,
        staged: &Path,
        file_name: &str,
        remote_dir: &str,
    ) -> Result<TransferRecord, CoreError> {
        let result = self.upload_staged_inner(conn_id, staged, file_name, remote_dir).await;
        if let Err(e) = tokio::fs::remove_file(staged).await {
            warn!(path = %staged.display(), "Failed to remove staged upload: {e}");
        }
        result
    }

    async fn upload_staged_inner(
        &self,
        conn_id: &str,
        staged: &Path,
        file_name: &str,
        remote_dir: &str,
    ) -> Result<TransferRecord, CoreError> {
        let session = self.registry.get(conn_id).await?;
        let size = tokio::fs::metadata(staged)
            .await
            .map_err(|e| CoreError::Filesystem(format!("stat {}: {e}", staged.display())))?
            .len();

        let remote_target = join_remote_path(remote_dir, file_name);
        let record = TransferRecord::new(
            TransferKind::Upload,
            file_name,
            &staged.to_string_lossy(),
            &remote_target,
        )
        .with_size(size);
        let record = self.queue.create(record).await;
        info!(transfer_id = %record.id, remote = %remote_target, size, "Staged upload started");

        let result = self.put(&session, staged, &remote_target).await;
        self.finish(&record.id, result).await
    }

    /// Download a remote file or directory into `local_dir`.
    ///
    /// The remote entry is inspected first; directories are copied
    /// recursively to `local_dir/<name>`.
    pub async fn download_remote_path(
        &self,
        conn_id: &str,
        remote_path: &str,
        local_dir: &Path,
    ) -> Result<TransferRecord, CoreError> {
        let session = self.registry.get(conn_id).await?;
        let entry = session.adapter().stat(remote_path).await?;

        let mut file_name = remote_file_name(remote_path);
        if file_name.is_empty() {
            file_name = ROOT_DOWNLOAD_NAME.to_string();
        }
        let local_target = local_dir.join(&file_name);
        let record = TransferRecord::new(
            TransferKind::Download,
            &file_name,
            &local_target.to_string_lossy(),
            remote_path,
        );
        let record = if entry.is_directory {
            record.directory()
        } else {
            record.with_size(entry.size)
        };
        let record = self.queue.create(record).await;
        info!(
            transfer_id = %record.id,
            conn_id = %conn_id,
            remote = %remote_path,
            local = %local_target.display(),
            directory = record.is_directory,
            "Download started"
        );

        let result = if record.is_directory {
            DirectoryWalker::new(session.adapter())
                .download(remote_path, &local_target)
                .await
                .map(|summary| summary.bytes)
        } else {
            session
                .adapter()
                .get_file(remote_path, &local_target)
                .await
                .map_err(CoreError::from)
        };
        self.finish(&record.id, result).await
    }

    async fn put(&self, session: &Session, local: &Path, remote: &str) -> Result<u64, CoreError> {
        session
            .adapter()
            .put_file(local, remote)
            .await
            .map_err(CoreError::from)
    }

    /// Move the record to its terminal state and shape the caller's result.
    async fn finish(
        &self,
        transfer_id: &str,
        result: Result<u64, CoreError>,
    ) -> Result<TransferRecord, CoreError> {
        match result {
            Ok(bytes) => {
                info!(transfer_id = %transfer_id, bytes, "Transfer completed");
                self.queue
                    .complete(transfer_id)
                    .await
                    .ok_or_else(|| CoreError::Transfer {
                        transfer_id: transfer_id.to_string(),
                        message: "transfer record disappeared".to_string(),
                    })
            }
            Err(e) => {
                let message = e.to_string();
                warn!(transfer_id = %transfer_id, "Transfer failed: {message}");
                self.queue.fail(transfer_id, &message).await;
                Err(CoreError::Transfer {
                    transfer_id: transfer_id.to_string(),
                    message,
                })
            }
        }
    }
}
