//! SFTP backend over a blocking libssh2 session.
//!
//! Every operation runs on the blocking pool and holds the session mutex for
//! its whole duration, so a session performs one remote round-trip sequence
//! at a time.

pub mod auth;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::{ConnectConfig, ProtocolKind};
use crate::errors::{map_io_error, CoreError, FileError};
use crate::files::utils::{
    chrono_from_epoch, format_permissions, join_remote_path, remote_file_name, remote_prefixes,
};
use crate::files::{entry_type, finalize_listing, DirListing, FileEntry, ProtocolAdapter};

use auth::connect_and_authenticate;

const COPY_BUFFER_SIZE: usize = 32 * 1024;

struct SftpState {
    session: ssh2::Session,
    sftp: ssh2::Sftp,
}

/// SFTP implementation of [`ProtocolAdapter`].
pub struct SftpAdapter {
    state: Arc<Mutex<Option<SftpState>>>,
}

impl SftpAdapter {
    /// Connect and authenticate. Blocks; call from the blocking pool.
    pub fn connect(config: &ConnectConfig) -> Result<Self, CoreError> {
        let session = connect_and_authenticate(config)?;
        let sftp = session
            .sftp()
            .map_err(|e| CoreError::Connection(format!("SFTP init failed: {e}")))?;
        debug!(address = %config.address(), "SFTP subsystem started");

        Ok(Self {
            state: Arc::new(Mutex::new(Some(SftpState { session, sftp }))),
        })
    }

    /// Run `op` against the live SFTP channel on the blocking pool.
    async fn with_sftp<T, F>(&self, op: F) -> Result<T, FileError>
    where
        T: Send + 'static,
        F: FnOnce(&ssh2::Sftp) -> Result<T, FileError> + Send + 'static,
    {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let guard = state
                .lock()
                .map_err(|e| FileError::OperationFailed(format!("Lock failed: {e}")))?;
            let sftp_state = guard
                .as_ref()
                .ok_or_else(|| FileError::OperationFailed("connection closed".to_string()))?;
            op(&sftp_state.sftp)
        })
        .await
        .map_err(|e| FileError::OperationFailed(format!("Task join failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl ProtocolAdapter for SftpAdapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Sftp
    }

    async fn list(&self, path: &str) -> Result<DirListing, FileError> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let resolved = sftp
                .realpath(Path::new(&path))
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| path.clone());
            let entries = sftp
                .readdir(Path::new(&resolved))
                .map_err(|e| map_ssh_error(e, &resolved))?;

            let entries = entries
                .into_iter()
                .map(|(pathbuf, stat)| {
                    let name = pathbuf
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    to_entry(join_remote_path(&resolved, &name), name, &stat)
                })
                .collect();

            Ok(DirListing {
                path: resolved,
                entries: finalize_listing(entries),
            })
        })
        .await
    }

    async fn stat(&self, path: &str) -> Result<FileEntry, FileError> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let stat = sftp
                .stat(Path::new(&path))
                .map_err(|e| map_ssh_error(e, &path))?;
            Ok(to_entry(path.clone(), remote_file_name(&path), &stat))
        })
        .await
    }

    async fn make_directory(&self, path: &str) -> Result<(), FileError> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            for prefix in remote_prefixes(&path) {
                match sftp.stat(Path::new(&prefix)) {
                    Ok(stat) if stat.is_dir() => continue,
                    Ok(_) => {
                        return Err(FileError::OperationFailed(format!(
                            "{prefix}: exists and is not a directory"
                        )))
                    }
                    Err(_) => sftp
                        .mkdir(Path::new(&prefix), 0o755)
                        .map_err(|e| map_ssh_error(e, &prefix))?,
                }
            }
            Ok(())
        })
        .await
    }

    async fn remove(&self, path: &str, is_directory: bool) -> Result<(), FileError> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            if is_directory {
                remove_tree(sftp, Path::new(&path))
            } else {
                sftp.unlink(Path::new(&path))
                    .map_err(|e| map_ssh_error(e, &path))
            }
        })
        .await
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), FileError> {
        let old_path = old_path.to_string();
        let new_path = new_path.to_string();
        self.with_sftp(move |sftp| {
            sftp.rename(Path::new(&old_path), Path::new(&new_path), None)
                .map_err(|e| map_ssh_error(e, &old_path))
        })
        .await
    }

    async fn change_permissions(&self, path: &str, mode: u32) -> Result<(), FileError> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let stat = ssh2::FileStat {
                size: None,
                uid: None,
                gid: None,
                perm: Some(mode),
                atime: None,
                mtime: None,
            };
            sftp.setstat(Path::new(&path), stat)
                .map_err(|e| map_ssh_error(e, &path))
        })
        .await
    }

    async fn get_file(&self, remote_path: &str, local_path: &Path) -> Result<u64, FileError> {
        let remote_path = remote_path.to_string();
        let local_path = local_path.to_path_buf();
        self.with_sftp(move |sftp| {
            let mut remote_file = sftp
                .open(Path::new(&remote_path))
                .map_err(|e| map_ssh_error(e, &remote_path))?;
            let mut local_file = std::fs::File::create(&local_path)
                .map_err(|e| map_io_error(e, &local_path.to_string_lossy()))?;
            copy_stream(&mut remote_file, &mut local_file, &remote_path)
        })
        .await
    }

    async fn put_file(&self, local_path: &Path, remote_path: &str) -> Result<u64, FileError> {
        let remote_path = remote_path.to_string();
        let local_path = local_path.to_path_buf();
        self.with_sftp(move |sftp| {
            let mut local_file = std::fs::File::open(&local_path)
                .map_err(|e| map_io_error(e, &local_path.to_string_lossy()))?;
            let mut remote_file = sftp
                .create(Path::new(&remote_path))
                .map_err(|e| map_ssh_error(e, &remote_path))?;
            copy_stream(&mut local_file, &mut remote_file, &remote_path)
        })
        .await
    }

    async fn close(&self) -> Result<(), FileError> {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let taken = state
                .lock()
                .map_err(|e| FileError::OperationFailed(format!("Lock failed: {e}")))?
                .take();
            if let Some(SftpState { session, sftp }) = taken {
                drop(sftp);
                session
                    .disconnect(None, "closing", None)
                    .map_err(|e| FileError::OperationFailed(format!("disconnect: {e}")))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| FileError::OperationFailed(format!("Task join failed: {e}")))?
    }
}

/// Copy in fixed-size chunks, returning the number of bytes written.
fn copy_stream(
    reader: &mut impl Read,
    writer: &mut impl Write,
    path: &str,
) -> Result<u64, FileError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| FileError::OperationFailed(format!("{path}: read failed: {e}")))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .map_err(|e| FileError::OperationFailed(format!("{path}: write failed: {e}")))?;
        total += n as u64;
    }
    writer
        .flush()
        .map_err(|e| FileError::OperationFailed(format!("{path}: flush failed: {e}")))?;
    Ok(total)
}

/// Depth-first delete. `readdir` reports link attributes, so symlinked
/// directories are unlinked rather than followed.
fn remove_tree(sftp: &ssh2::Sftp, dir: &Path) -> Result<(), FileError> {
    let display = dir.to_string_lossy().to_string();
    let children = sftp.readdir(dir).map_err(|e| map_ssh_error(e, &display))?;
    for (child, stat) in children {
        let name = child
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.is_empty() || name == "." || name == ".." {
            continue;
        }
        let child = PathBuf::from(join_remote_path(&display, &name));
        if stat.is_dir() {
            remove_tree(sftp, &child)?;
        } else {
            sftp.unlink(&child)
                .map_err(|e| map_ssh_error(e, &child.to_string_lossy()))?;
        }
    }
    sftp.rmdir(dir).map_err(|e| map_ssh_error(e, &display))
}

fn to_entry(path: String, name: String, stat: &ssh2::FileStat) -> FileEntry {
    let is_directory = stat.is_dir();
    FileEntry {
        file_type: entry_type(&name, is_directory),
        name,
        path,
        is_directory,
        size: stat.size.unwrap_or(0),
        modified: stat.mtime.map(chrono_from_epoch).unwrap_or_default(),
        permissions: stat.perm.map(|p| format_permissions(p & 0o777)),
        owner: stat.uid.map(|u| u.to_string()),
        group: stat.gid.map(|g| g.to_string()),
    }
}

/// Map ssh2 errors to FileError.
fn map_ssh_error(e: ssh2::Error, path: &str) -> FileError {
    // SSH_FX_NO_SUCH_FILE = 2, SSH_FX_PERMISSION_DENIED = 3
    match e.code() {
        ssh2::ErrorCode::SFTP(2) => FileError::NotFound(path.to_string()),
        ssh2::ErrorCode::SFTP(3) => FileError::PermissionDenied(path.to_string()),
        _ => FileError::OperationFailed(format!("{path}: {}", e.message())),
    }
}
