//! Local filesystem access used by the walker and the local browsing
//! endpoints.
//!
//! The synchronous functions do the work; the async wrappers offload them to
//! the blocking pool so the executor never waits on disk I/O.

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use super::utils::{chrono_from_epoch, normalize_path_separators};
use super::{entry_type, finalize_listing, FileEntry};
use crate::errors::{map_io_error, FileError};

/// Metadata for a single local path, as shown by the info panel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalInfo {
    #[serde(flatten)]
    pub entry: FileEntry,
    /// Creation time where the platform reports one.
    pub created_date: Option<String>,
}

/// Resolve a user-supplied local path: `~` is expanded and an empty or
/// missing path means the home directory.
pub fn resolve_local_path(path: Option<&str>) -> PathBuf {
    match path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => PathBuf::from(shellexpand::tilde(p).as_ref()),
        None => dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
    }
}

/// Parent directory of a local path, `None` at a filesystem root.
pub fn local_parent(path: &Path) -> Option<String> {
    path.parent()
        .map(|p| normalize_path_separators(&p.to_string_lossy()))
}

/// List directory contents, filtering out `.` and `..`.
///
/// Entries whose metadata cannot be read (dangling symlinks, races with
/// deletion) are skipped. `is_directory` does not follow symlinks so a
/// recursive walk cannot loop through a link cycle.
pub fn list_dir_sync(path: &Path) -> Result<Vec<FileEntry>, FileError> {
    let display = path.to_string_lossy().to_string();
    let entries = std::fs::read_dir(path).map_err(|e| map_io_error(e, &display))?;

    let mut result = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| map_io_error(e, &display))?;
        let name = entry.file_name().to_string_lossy().to_string();

        let is_directory = match entry.file_type() {
            Ok(ft) => ft.is_dir(),
            Err(_) => continue,
        };
        let Ok(metadata) = std::fs::metadata(entry.path()) else {
            continue;
        };

        result.push(FileEntry {
            file_type: entry_type(&name, is_directory),
            path: normalize_path_separators(&entry.path().to_string_lossy()),
            name,
            is_directory,
            size: metadata.len(),
            modified: format_time(metadata.modified().ok()),
            permissions: get_permissions(&metadata),
            owner: None,
            group: None,
        });
    }

    Ok(finalize_listing(result))
}

/// Metadata for one local path (follows symlinks).
pub fn stat_sync(path: &Path) -> Result<LocalInfo, FileError> {
    let display = path.to_string_lossy().to_string();
    let metadata = std::fs::metadata(path).map_err(|e| map_io_error(e, &display))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| display.clone());
    let is_directory = metadata.is_dir();

    Ok(LocalInfo {
        entry: FileEntry {
            file_type: entry_type(&name, is_directory),
            name,
            path: normalize_path_separators(&display),
            is_directory,
            size: metadata.len(),
            modified: format_time(metadata.modified().ok()),
            permissions: get_permissions(&metadata),
            owner: None,
            group: None,
        },
        created_date: metadata.created().ok().map(|t| format_time(Some(t))),
    })
}

/// Remove a file, or a directory together with everything below it.
pub fn remove_sync(path: &Path) -> Result<(), FileError> {
    let display = path.to_string_lossy().to_string();
    let metadata = std::fs::symlink_metadata(path).map_err(|e| map_io_error(e, &display))?;
    if metadata.is_dir() {
        std::fs::remove_dir_all(path).map_err(|e| map_io_error(e, &display))
    } else {
        std::fs::remove_file(path).map_err(|e| map_io_error(e, &display))
    }
}

pub async fn list_dir(path: &Path) -> Result<Vec<FileEntry>, FileError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || list_dir_sync(&path))
        .await
        .map_err(|e| FileError::OperationFailed(format!("Task join failed: {e}")))?
}

pub async fn stat(path: &Path) -> Result<LocalInfo, FileError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || stat_sync(&path))
        .await
        .map_err(|e| FileError::OperationFailed(format!("Task join failed: {e}")))?
}

/// Create a directory and any missing parents. Existing directories are
/// not an error.
pub async fn create_dir_all(path: &Path) -> Result<(), FileError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| map_io_error(e, &path.to_string_lossy()))
}

pub async fn remove(path: &Path) -> Result<(), FileError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || remove_sync(&path))
        .await
        .map_err(|e| FileError::OperationFailed(format!("Task join failed: {e}")))?
}

pub async fn rename(old_path: &Path, new_path: &Path) -> Result<(), FileError> {
    tokio::fs::rename(old_path, new_path)
        .await
        .map_err(|e| map_io_error(e, &old_path.to_string_lossy()))
}

fn format_time(time: Option<SystemTime>) -> String {
    time.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| chrono_from_epoch(d.as_secs()))
        .unwrap_or_default()
}

/// Get permission string from metadata (Unix only).
#[cfg(unix)]
fn get_permissions(metadata: &std::fs::Metadata) -> Option<String> {
    use super::utils::format_permissions;
    Some(format_permissions(metadata.permissions().mode()))
}

/// On non-Unix platforms, permissions are not available in rwx format.
#[cfg(not(unix))]
fn get_permissions(_metadata: &std::fs::Metadata) -> Option<String> {
    None
}
