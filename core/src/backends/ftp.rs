//! FTP and FTPS backend built on the blocking `suppaftp` client.
//!
//! FTP keeps a per-connection working directory on the server and listings
//! are taken relative to it, so `list` is a cd, pwd, LIST sequence. The
//! stream mutex is held across the whole sequence; concurrent callers on the
//! same session queue up instead of interleaving their `CWD` commands.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use suppaftp::list::{File as ListedFile, PosixPexQuery};
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream};
use tracing::{debug, warn};

use crate::backends::{resolve_addr, CONNECT_TIMEOUT};
use crate::config::{ConnectConfig, ProtocolKind};
use crate::errors::{map_io_error, CoreError, FileError};
use crate::files::utils::{
    chrono_from_epoch, format_permissions, join_remote_path, remote_file_name, remote_parent,
    remote_prefixes,
};
use crate::files::{entry_type, finalize_listing, DirListing, FileEntry, ProtocolAdapter};

/// FTP/FTPS implementation of [`ProtocolAdapter`].
///
/// Both variants use the TLS-capable stream type; plain FTP simply never
/// upgrades it.
pub struct FtpAdapter {
    kind: ProtocolKind,
    stream: Arc<Mutex<Option<NativeTlsFtpStream>>>,
}

impl FtpAdapter {
    /// Connect, optionally upgrade to explicit TLS, log in and switch to
    /// binary mode. Blocks; call from the blocking pool.
    pub fn connect(config: &ConnectConfig) -> Result<Self, CoreError> {
        let addr = resolve_addr(&config.host, config.effective_port())
            .map_err(|e| CoreError::Connection(format!("{}: {e}", config.address())))?;
        let mut stream = NativeTlsFtpStream::connect_timeout(addr, CONNECT_TIMEOUT)
            .map_err(|e| CoreError::Connection(format!("{}: {e}", config.address())))?;

        if config.protocol == ProtocolKind::Ftps {
            let tls = TlsConnector::new()
                .map_err(|e| CoreError::Connection(format!("TLS setup failed: {e}")))?;
            stream = stream
                .into_secure(NativeTlsConnector::from(tls), &config.host)
                .map_err(|e| CoreError::Connection(format!("TLS negotiation failed: {e}")))?;
        }

        let password = config.credentials.password.as_deref().unwrap_or("");
        if let Err(e) = stream.login(config.username.as_str(), password) {
            let _ = stream.quit();
            return Err(CoreError::Connection(format!("Login failed: {e}")));
        }
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| CoreError::Connection(format!("TYPE I failed: {e}")))?;
        debug!(address = %config.address(), kind = %config.protocol, "FTP login complete");

        Ok(Self {
            kind: config.protocol,
            stream: Arc::new(Mutex::new(Some(stream))),
        })
    }

    /// An adapter with no live connection. Every remote call fails with
    /// "connection closed".
    pub fn detached(kind: ProtocolKind) -> Self {
        Self {
            kind,
            stream: Arc::new(Mutex::new(None)),
        }
    }

    async fn with_stream<T, F>(&self, op: F) -> Result<T, FileError>
    where
        T: Send + 'static,
        F: FnOnce(&mut NativeTlsFtpStream) -> Result<T, FileError> + Send + 'static,
    {
        let stream = self.stream.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = stream
                .lock()
                .map_err(|e| FileError::OperationFailed(format!("Lock failed: {e}")))?;
            let ftp = guard
                .as_mut()
                .ok_or_else(|| FileError::OperationFailed("connection closed".to_string()))?;
            op(ftp)
        })
        .await
        .map_err(|e| FileError::OperationFailed(format!("Task join failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl ProtocolAdapter for FtpAdapter {
    fn kind(&self) -> ProtocolKind {
        self.kind
    }

    async fn list(&self, path: &str) -> Result<DirListing, FileError> {
        let path = path.to_string();
        self.with_stream(move |ftp| {
            let (resolved, entries) = list_current(ftp, &path)?;
            Ok(DirListing {
                path: resolved,
                entries: finalize_listing(entries),
            })
        })
        .await
    }

    async fn stat(&self, path: &str) -> Result<FileEntry, FileError> {
        let path = path.to_string();
        self.with_stream(move |ftp| {
            let name = remote_file_name(&path);
            if ftp.cwd(&path).is_ok() {
                return Ok(FileEntry {
                    file_type: entry_type(&name, true),
                    name,
                    path,
                    is_directory: true,
                    size: 0,
                    modified: String::new(),
                    permissions: None,
                    owner: None,
                    group: None,
                });
            }
            match ftp.size(&path) {
                Ok(size) => Ok(FileEntry {
                    file_type: entry_type(&name, false),
                    name,
                    path,
                    is_directory: false,
                    size: size as u64,
                    modified: String::new(),
                    permissions: None,
                    owner: None,
                    group: None,
                }),
                Err(_) => Err(FileError::NotFound(path)),
            }
        })
        .await
    }

    async fn make_directory(&self, path: &str) -> Result<(), FileError> {
        let path = path.to_string();
        self.with_stream(move |ftp| {
            for prefix in remote_prefixes(&path) {
                if ftp.cwd(&prefix).is_ok() {
                    continue;
                }
                ftp.mkdir(&prefix).map_err(|e| map_ftp_error(e, &prefix))?;
            }
            Ok(())
        })
        .await
    }

    async fn remove(&self, path: &str, is_directory: bool) -> Result<(), FileError> {
        let path = path.to_string();
        self.with_stream(move |ftp| {
            if is_directory {
                remove_tree(ftp, &path)
            } else {
                ftp.rm(&path).map_err(|e| map_ftp_error(e, &path))
            }
        })
        .await
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), FileError> {
        let old_path = old_path.to_string();
        let new_path = new_path.to_string();
        self.with_stream(move |ftp| {
            ftp.rename(&old_path, &new_path)
                .map_err(|e| map_ftp_error(e, &old_path))
        })
        .await
    }

    async fn change_permissions(&self, _path: &str, _mode: u32) -> Result<(), FileError> {
        Err(FileError::NotSupported("chmod".to_string()))
    }

    async fn get_file(&self, remote_path: &str, local_path: &Path) -> Result<u64, FileError> {
        let remote_path = remote_path.to_string();
        let local_path = local_path.to_path_buf();
        self.with_stream(move |ftp| {
            let mut local_file = std::fs::File::create(&local_path)
                .map_err(|e| map_io_error(e, &local_path.to_string_lossy()))?;
            ftp.retr(&remote_path, |reader| {
                std::io::copy(reader, &mut local_file).map_err(FtpError::ConnectionError)
            })
            .map_err(|e| map_ftp_error(e, &remote_path))
        })
        .await
    }

    async fn put_file(&self, local_path: &Path, remote_path: &str) -> Result<u64, FileError> {
        let remote_path = remote_path.to_string();
        let local_path = local_path.to_path_buf();
        self.with_stream(move |ftp| {
            let mut local_file = std::fs::File::open(&local_path)
                .map_err(|e| map_io_error(e, &local_path.to_string_lossy()))?;
            ftp.put_file(&remote_path, &mut local_file)
                .map_err(|e| map_ftp_error(e, &remote_path))
        })
        .await
    }

    async fn close(&self) -> Result<(), FileError> {
        let stream = self.stream.clone();
        tokio::task::spawn_blocking(move || {
            let taken = stream
                .lock()
                .map_err(|e| FileError::OperationFailed(format!("Lock failed: {e}")))?
                .take();
            if let Some(mut ftp) = taken {
                ftp.quit()
                    .map_err(|e| FileError::OperationFailed(format!("QUIT: {e}")))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| FileError::OperationFailed(format!("Task join failed: {e}")))?
    }
}

/// `CWD path`, `PWD`, `LIST` as one unit. Returns the server's idea of the
/// directory together with the parsed (unsorted) entries.
fn list_current(
    ftp: &mut NativeTlsFtpStream,
    path: &str,
) -> Result<(String, Vec<FileEntry>), FileError> {
    ftp.cwd(path).map_err(|e| map_ftp_error(e, path))?;
    let resolved = ftp.pwd().map_err(|e| map_ftp_error(e, path))?;
    let lines = ftp.list(None).map_err(|e| map_ftp_error(e, &resolved))?;
    let entries = lines
        .iter()
        .filter_map(|line| parse_list_line(line, &resolved))
        .collect();
    Ok((resolved, entries))
}

/// Parse one line of a `LIST` reply (UNIX or DOS style).
fn parse_list_line(line: &str, dir: &str) -> Option<FileEntry> {
    let file = match line.parse::<ListedFile>() {
        Ok(file) => file,
        Err(_) => {
            warn!(line, "Skipping unparseable LIST line");
            return None;
        }
    };
    let name = file.name().to_string();
    let is_directory = file.is_directory();
    let modified = file
        .modified()
        .duration_since(UNIX_EPOCH)
        .map(|d| chrono_from_epoch(d.as_secs()))
        .unwrap_or_default();

    Some(FileEntry {
        file_type: entry_type(&name, is_directory),
        path: join_remote_path(dir, &name),
        name,
        is_directory,
        size: file.size() as u64,
        modified,
        permissions: listed_mode(&file).map(format_permissions),
        owner: file.uid().map(|u| u.to_string()),
        group: file.gid().map(|g| g.to_string()),
    })
}

/// Rebuild the permission bits from the parsed listing. DOS-style lines
/// carry none.
fn listed_mode(file: &ListedFile) -> Option<u32> {
    let mut mode = 0u32;
    for shift in [6, 3, 0] {
        if file.can_read(pex_class(shift)) {
            mode |= 0o4 << shift;
        }
        if file.can_write(pex_class(shift)) {
            mode |= 0o2 << shift;
        }
        if file.can_execute(pex_class(shift)) {
            mode |= 0o1 << shift;
        }
    }
    (mode != 0).then_some(mode)
}

fn pex_class(shift: u32) -> PosixPexQuery {
    match shift {
        6 => PosixPexQuery::Owner,
        3 => PosixPexQuery::Group,
        _ => PosixPexQuery::Others,
    }
}

/// Depth-first delete of a directory tree.
fn remove_tree(ftp: &mut NativeTlsFtpStream, path: &str) -> Result<(), FileError> {
    let (resolved, entries) = list_current(ftp, path)?;
    for entry in entries {
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        if entry.is_directory {
            remove_tree(ftp, &entry.path)?;
        } else {
            ftp.rm(&entry.path)
                .map_err(|e| map_ftp_error(e, &entry.path))?;
        }
    }
    // Some servers refuse to remove the working directory.
    if let Some(parent) = remote_parent(&resolved) {
        let _ = ftp.cwd(&parent);
    }
    ftp.rmdir(&resolved).map_err(|e| map_ftp_error(e, &resolved))
}

fn map_ftp_error(e: FtpError, path: &str) -> FileError {
    FileError::OperationFailed(format!("{path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_list_lines() {
        let line = "-rw-r--r-- 1 1000 100 4096 Nov 14 22:13 report.pdf";
        let entry = parse_list_line(line, "/pub").unwrap();
        assert_eq!(entry.name, "report.pdf");
        assert_eq!(entry.path, "/pub/report.pdf");
        assert!(!entry.is_directory);
        assert_eq!(entry.size, 4096);
        assert_eq!(entry.file_type, "pdf");
        assert_eq!(entry.permissions.as_deref(), Some("rw-r--r--"));

        let line = "drwxr-xr-x 2 1000 100 4096 Jan 01 2023 docs";
        let entry = parse_list_line(line, "/").unwrap();
        assert!(entry.is_directory);
        assert_eq!(entry.path, "/docs");
        assert_eq!(entry.permissions.as_deref(), Some("rwxr-xr-x"));
    }

    #[test]
    fn unparseable_lines_are_skipped() {
        assert!(parse_list_line("total 12", "/").is_none());
    }

    #[test]
    fn dot_entries_are_filtered_from_listings() {
        let raw = [
            "drwxr-xr-x 2 1000 100 4096 Jan 01 2023 .",
            "drwxr-xr-x 2 1000 100 4096 Jan 01 2023 ..",
            "-rw-r--r-- 1 1000 100 10 Jan 01 2023 b.txt",
            "drwxr-xr-x 2 1000 100 4096 Jan 01 2023 a",
        ];
        let entries: Vec<FileEntry> = raw
            .iter()
            .filter_map(|l| parse_list_line(l, "/srv"))
            .collect();
        let names: Vec<String> = finalize_listing(entries)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a", "b.txt"]);
    }

    #[tokio::test]
    async fn chmod_is_unsupported_without_touching_the_connection() {
        let adapter = FtpAdapter::detached(ProtocolKind::Ftp);
        let err = adapter.change_permissions("/x", 0o644).await.unwrap_err();
        assert!(matches!(err, FileError::NotSupported(ref op) if op == "chmod"));
    }

    #[tokio::test]
    async fn detached_adapter_reports_closed_connection() {
        let adapter = FtpAdapter::detached(ProtocolKind::Ftps);
        assert_eq!(adapter.kind(), ProtocolKind::Ftps);
        let err = adapter.list("/").await.unwrap_err();
        assert!(err.to_string().contains("connection closed"));
        adapter.close().await.unwrap();
    }
}
